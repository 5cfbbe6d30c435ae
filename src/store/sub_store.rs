/*
 * Copyright 2019-2021 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::sync::Arc;

use async_trait::async_trait;

use super::storage::Storage;
use super::ticket::Ticket;
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::Meta;

/// A `Storage` which confines every key under a fixed prefix of another storage.
///
/// Keys passed to a `SubStorage` are relative to its prefix, and keys it returns from `list` are
/// relative too. A value stored at exactly the prefix in the origin is outside of the view, just
/// like a value stored at [`Key::ROOT`] would be.
///
/// With [`Key::ROOT`] as the prefix, a `SubStorage` passes every operation through unchanged.
///
/// Exclusive access is taken on the origin with the prefixed key, so a `SubStorage` and its
/// origin see the same tickets.
#[derive(Debug, Clone)]
pub struct SubStorage {
    prefix: Key,
    origin: Arc<dyn Storage>,
}

impl SubStorage {
    /// Create a view of `origin` confined under `prefix`.
    pub fn new(prefix: Key, origin: Arc<dyn Storage>) -> Self {
        SubStorage { prefix, origin }
    }

    /// The prefix of this view in the origin storage.
    pub fn prefix(&self) -> &Key {
        &self.prefix
    }

    fn origin_key(&self, key: &Key) -> Key {
        self.prefix.concat(key)
    }

    /// Report errors about origin keys in terms of the relative `keys` of the operation.
    fn relative_error(&self, keys: &[&Key], error: Error) -> Error {
        let relative = |origin: Key| match keys.iter().find(|key| self.origin_key(key) == origin) {
            Some(key) => (*key).clone(),
            None => origin,
        };
        match error {
            Error::NotFound(origin) => Error::NotFound(relative(origin)),
            Error::Locked(origin) => Error::Locked(relative(origin)),
            Error::InvalidOperation(message) => {
                Error::InvalidOperation(keys.iter().fold(message, |message, key| {
                    message.replace(
                        &format!("'{}'", self.origin_key(key)),
                        &format!("'{}'", key),
                    )
                }))
            }
            other => other,
        }
    }

    fn reject_root(key: &Key, operation: &str) -> Result<()> {
        if key.is_root() {
            Err(Error::invalid(format!("Cannot {} the root key.", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for SubStorage {
    async fn exists(&self, key: &Key) -> Result<bool> {
        if key.is_root() {
            return Ok(false);
        }
        self.origin.exists(&self.origin_key(key)).await
    }

    async fn save(&self, key: &Key, content: Content) -> Result<()> {
        Self::reject_root(key, "save")?;
        self.origin
            .save(&self.origin_key(key), content)
            .await
            .map_err(|error| self.relative_error(&[key], error))
    }

    async fn value(&self, key: &Key) -> Result<Content> {
        Self::reject_root(key, "read")?;
        self.origin
            .value(&self.origin_key(key))
            .await
            .map_err(|error| self.relative_error(&[key], error))
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        Self::reject_root(key, "delete")?;
        self.origin
            .delete(&self.origin_key(key))
            .await
            .map_err(|error| self.relative_error(&[key], error))
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        Ok(self
            .origin
            .list(&self.origin_key(prefix))
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix))
            .filter(|key| !key.is_root())
            .collect())
    }

    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        Self::reject_root(source, "move")?;
        Self::reject_root(destination, "overwrite")?;
        self.origin
            .move_value(&self.origin_key(source), &self.origin_key(destination))
            .await
            .map_err(|error| self.relative_error(&[source, destination], error))
    }

    async fn metadata(&self, key: &Key) -> Result<Meta> {
        if key.is_root() {
            return Err(Error::NotFound(key.clone()));
        }
        self.origin
            .metadata(&self.origin_key(key))
            .await
            .map_err(|error| self.relative_error(&[key], error))
    }

    async fn size(&self, key: &Key) -> Result<u64> {
        if key.is_root() {
            return Err(Error::NotFound(key.clone()));
        }
        self.origin
            .size(&self.origin_key(key))
            .await
            .map_err(|error| self.relative_error(&[key], error))
    }

    fn acquire(&self, key: &Key) -> Result<Ticket> {
        self.origin
            .acquire(&self.origin_key(key))
            .map_err(|error| self.relative_error(&[key], error))
    }

    fn identifier(&self) -> String {
        format!(
            "SubStorage: prefix='{}', origin={}",
            self.prefix,
            self.origin.identifier()
        )
    }
}
