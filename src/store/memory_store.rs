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

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::open_store::OpenStorage;
use super::storage::Storage;
use super::ticket::{Ticket, TicketTable};
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::Meta;

/// The configuration for opening a [`MemoryStorage`].
///
/// Every storage opened from the same config (or a clone of it) shares the same data.
///
/// [`MemoryStorage`]: crate::store::MemoryStorage
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    storage: MemoryStorage,
}

impl MemoryConfig {
    /// Create a new `MemoryConfig` for an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OpenStorage for MemoryConfig {
    type Storage = MemoryStorage;

    fn open(&self) -> crate::Result<Self::Storage> {
        Ok(self.storage.clone())
    }
}

/// A `Storage` which stores values in memory.
///
/// Unlike other `Storage` implementations, values in a `MemoryStorage` are not stored
/// persistently and are only accessible to the current process. This storage is useful for
/// testing.
///
/// Cloning a `MemoryStorage` returns a handle to the same values and the same table of
/// exclusive keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<BTreeMap<String, Bytes>>>,
    tickets: Arc<TicketTable>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, Bytes>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn reject_root(key: &Key, operation: &str) -> Result<()> {
    if key.is_root() {
        Err(Error::invalid(format!(
            "Cannot {} the root key.",
            operation
        )))
    } else {
        Ok(())
    }
}

fn has_descendants(values: &BTreeMap<String, Bytes>, key: &Key) -> bool {
    values
        .range(key.as_str().to_owned()..)
        .take_while(|(stored, _)| stored.starts_with(key.as_str()))
        .any(|(stored, _)| key.is_ancestor_of(&Key::new(stored)))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, key: &Key) -> Result<bool> {
        Ok(!key.is_root() && self.values().contains_key(key.as_str()))
    }

    async fn save(&self, key: &Key, content: Content) -> Result<()> {
        reject_root(key, "save")?;
        // Nothing is inserted until the whole stream has been read.
        let data = content.bytes().await?;
        debug!(key = %key, size = data.len(), "Saving value in memory");
        self.values().insert(key.as_str().to_owned(), data);
        Ok(())
    }

    async fn value(&self, key: &Key) -> Result<Content> {
        reject_root(key, "read")?;
        self.values()
            .get(key.as_str())
            .map(|data| Content::from_bytes(data.clone()))
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        reject_root(key, "delete")?;
        let mut values = self.values();
        match values.remove(key.as_str()) {
            Some(_) => {
                debug!(key = %key, "Deleted value from memory");
                Ok(())
            }
            None if has_descendants(&values, key) => Err(Error::invalid(format!(
                "The key '{}' has no value of its own but has descendants.",
                key
            ))),
            None => Err(Error::NotFound(key.clone())),
        }
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        let values = self.values();
        Ok(values
            .range(prefix.as_str().to_owned()..)
            .take_while(|(stored, _)| stored.starts_with(prefix.as_str()))
            .map(|(stored, _)| Key::new(stored))
            .filter(|key| prefix.is_prefix_of(key))
            .collect())
    }

    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        reject_root(source, "move")?;
        reject_root(destination, "overwrite")?;
        let mut values = self.values();
        let data = values.remove(source.as_str()).ok_or_else(|| {
            Error::invalid(format!("Cannot move '{}' because it has no value.", source))
        })?;
        values.insert(destination.as_str().to_owned(), data);
        debug!(source = %source, destination = %destination, "Moved value in memory");
        Ok(())
    }

    async fn metadata(&self, key: &Key) -> Result<Meta> {
        self.values()
            .get(key.as_str())
            .filter(|_| !key.is_root())
            .map(|data| Meta::with_size(data.len() as u64))
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    fn acquire(&self, key: &Key) -> Result<Ticket> {
        self.tickets.acquire(key)
    }

    fn identifier(&self) -> String {
        String::from("InMemory")
    }
}
