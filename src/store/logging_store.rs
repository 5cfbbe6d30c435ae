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

use std::fmt::Display;

use async_trait::async_trait;
use tracing::Level;

use super::storage::Storage;
use super::ticket::Ticket;
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::Meta;

/// Emit `message` at a level only known at runtime.
fn log(level: Level, storage: &str, message: impl Display) {
    match level {
        Level::TRACE => tracing::trace!(storage, "{}", message),
        Level::DEBUG => tracing::debug!(storage, "{}", message),
        Level::INFO => tracing::info!(storage, "{}", message),
        Level::WARN => tracing::warn!(storage, "{}", message),
        _ => tracing::error!(storage, "{}", message),
    }
}

/// A `Storage` which logs every operation on another storage and its outcome.
///
/// Lines look like `Exists 'a/b': true` or `Delete 'a/b' failed: ...` and are emitted through
/// `tracing` at the configured level.
#[derive(Debug, Clone)]
pub struct LoggingStorage<S> {
    level: Level,
    origin: S,
}

impl<S: Storage> LoggingStorage<S> {
    /// Log the operations on `origin` at [`Level::INFO`].
    pub fn new(origin: S) -> Self {
        Self::with_level(Level::INFO, origin)
    }

    /// Log the operations on `origin` at the given `level`.
    pub fn with_level(level: Level, origin: S) -> Self {
        LoggingStorage { level, origin }
    }

    /// The storage whose operations are logged.
    pub fn origin(&self) -> &S {
        &self.origin
    }

    fn log(&self, message: impl Display) {
        log(self.level, &self.origin.identifier(), message);
    }

    fn log_failure(&self, operation: impl Display, error: &Error) {
        log(
            self.level,
            &self.origin.identifier(),
            format_args!("{} failed: {}", operation, error),
        );
    }
}

#[async_trait]
impl<S: Storage> Storage for LoggingStorage<S> {
    async fn exists(&self, key: &Key) -> Result<bool> {
        let result = self.origin.exists(key).await;
        match &result {
            Ok(exists) => self.log(format_args!("Exists '{}': {}", key, exists)),
            Err(error) => self.log_failure(format_args!("Exists '{}'", key), error),
        }
        result
    }

    async fn save(&self, key: &Key, content: Content) -> Result<()> {
        let size = content.size();
        let result = self.origin.save(key, content).await;
        match &result {
            Ok(()) => self.log(format_args!("Save '{}': {:?}", key, size)),
            Err(error) => self.log_failure(format_args!("Save '{}'", key), error),
        }
        result
    }

    async fn value(&self, key: &Key) -> Result<Content> {
        let result = self.origin.value(key).await;
        match &result {
            Ok(content) => self.log(format_args!("Value '{}': {:?}", key, content.size())),
            Err(error) => self.log_failure(format_args!("Value '{}'", key), error),
        }
        result
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let result = self.origin.delete(key).await;
        match &result {
            Ok(()) => self.log(format_args!("Delete '{}'", key)),
            Err(error) => self.log_failure(format_args!("Delete '{}'", key), error),
        }
        result
    }

    async fn delete_all(&self, prefix: &Key) -> Result<()> {
        let result = self.origin.delete_all(prefix).await;
        match &result {
            Ok(()) => self.log(format_args!("Delete all '{}'", prefix)),
            Err(error) => self.log_failure(format_args!("Delete all '{}'", prefix), error),
        }
        result
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        let result = self.origin.list(prefix).await;
        match &result {
            Ok(keys) => self.log(format_args!("List '{}': {}", prefix, keys.len())),
            Err(error) => self.log_failure(format_args!("List '{}'", prefix), error),
        }
        result
    }

    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        let result = self.origin.move_value(source, destination).await;
        match &result {
            Ok(()) => self.log(format_args!("Move '{}' '{}'", source, destination)),
            Err(error) => {
                self.log_failure(format_args!("Move '{}' '{}'", source, destination), error)
            }
        }
        result
    }

    async fn metadata(&self, key: &Key) -> Result<Meta> {
        let result = self.origin.metadata(key).await;
        match &result {
            Ok(meta) => self.log(format_args!("Metadata '{}': {:?}", key, meta)),
            Err(error) => self.log_failure(format_args!("Metadata '{}'", key), error),
        }
        result
    }

    async fn size(&self, key: &Key) -> Result<u64> {
        let result = self.origin.size(key).await;
        match &result {
            Ok(size) => self.log(format_args!("Size '{}': {}", key, size)),
            Err(error) => self.log_failure(format_args!("Size '{}'", key), error),
        }
        result
    }

    fn acquire(&self, key: &Key) -> Result<Ticket> {
        let result = self.origin.acquire(key);
        match &result {
            Ok(_) => self.log(format_args!("Exclusively for '{}': acquired", key)),
            Err(error) => self.log_failure(format_args!("Exclusively for '{}'", key), error),
        }
        result
    }

    fn identifier(&self) -> String {
        self.origin.identifier()
    }
}
