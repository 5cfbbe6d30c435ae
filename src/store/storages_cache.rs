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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::config::StorageConfig;
use super::storage::Storage;
use crate::error::Result;

#[derive(Debug)]
struct CachedStorage {
    storage: Arc<dyn Storage>,
    opened_at: Instant,
}

/// A cache of opened storages, keyed by their configuration.
///
/// Opening the same [`StorageConfig`] twice within the expiration time returns the same storage,
/// so every consumer shares its values and its table of exclusive keys. Expired entries are
/// opened again on their next use.
///
/// The cache is an ordinary value: create one, pass it by reference to whatever needs storages
/// and drop it when done.
#[derive(Debug)]
pub struct StoragesCache {
    ttl: Duration,
    entries: Mutex<HashMap<StorageConfig, CachedStorage>>,
}

impl StoragesCache {
    /// Create an empty cache whose entries expire `ttl` after they are opened.
    pub fn new(ttl: Duration) -> Self {
        StoragesCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<StorageConfig, CachedStorage>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the storage for `config`, opening it if it is not cached or has expired.
    ///
    /// # Errors
    /// Any error from [`StorageConfig::open`]. Failures are not cached.
    pub fn storage(&self, config: &StorageConfig) -> Result<Arc<dyn Storage>> {
        let mut entries = self.entries();
        let now = Instant::now();

        if let Some(cached) = entries.get(config) {
            if now.duration_since(cached.opened_at) < self.ttl {
                return Ok(Arc::clone(&cached.storage));
            }
        }

        let storage = config.open()?;
        debug!(storage = %storage.identifier(), "Opened storage for the cache");
        entries.insert(
            config.clone(),
            CachedStorage {
                storage: Arc::clone(&storage),
                opened_at: now,
            },
        );
        Ok(storage)
    }

    /// Remove the storage for `config`, returning whether it was cached.
    pub fn invalidate(&self, config: &StorageConfig) -> bool {
        self.entries().remove(config).is_some()
    }

    /// Remove every storage.
    pub fn invalidate_all(&self) {
        self.entries().clear();
    }

    /// The number of storages which are cached and have not expired.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|_, cached| now.duration_since(cached.opened_at) < self.ttl);
        entries.len()
    }

    /// Return whether no storage is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
