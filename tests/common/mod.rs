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

#![allow(dead_code)]

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use rstest::*;
use tempfile::TempDir;

use artifact_storage::store::{
    DirectoryConfig, LoggingStorage, MemoryStorage, OpenStorage, Storage, SubStorage, Ticket,
};
use artifact_storage::{Content, Key, Meta, Result};

pub use self::assertions::ErrorVariantAssertions;

mod assertions;

/// The kinds of storage every behavioral test runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Directory,
    Logging,
    MemoryRootView,
    MemoryPrefixView,
    DirectoryRootView,
    DirectoryPrefixView,
}

/// A value which is tied to the lifetime of a temporary directory.
pub struct WithTempDir<T> {
    directory: Option<TempDir>,
    value: T,
}

impl<T> WithTempDir<T> {
    fn without_directory(value: T) -> Self {
        WithTempDir {
            directory: None,
            value,
        }
    }
}

impl<T> Deref for WithTempDir<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

fn directory_storage() -> WithTempDir<Arc<dyn Storage>> {
    let directory = tempfile::tempdir().unwrap();
    let config = DirectoryConfig {
        path: directory.path().join("storage"),
    };
    WithTempDir {
        value: Arc::new(config.open().unwrap()),
        directory: Some(directory),
    }
}

/// Open an empty storage of the given kind.
pub fn open_storage(backend: Backend) -> WithTempDir<Arc<dyn Storage>> {
    match backend {
        Backend::Memory => WithTempDir::without_directory(Arc::new(MemoryStorage::new())),
        Backend::Directory => directory_storage(),
        Backend::Logging => WithTempDir::without_directory(Arc::new(LoggingStorage::new(
            MemoryStorage::new(),
        ))),
        Backend::MemoryRootView => WithTempDir::without_directory(Arc::new(SubStorage::new(
            Key::ROOT,
            Arc::new(MemoryStorage::new()),
        ))),
        Backend::MemoryPrefixView => WithTempDir::without_directory(Arc::new(SubStorage::new(
            Key::new("repos/maven"),
            Arc::new(MemoryStorage::new()),
        ))),
        Backend::DirectoryRootView => {
            let WithTempDir { directory, value } = directory_storage();
            WithTempDir {
                directory,
                value: Arc::new(SubStorage::new(Key::ROOT, value)),
            }
        }
        Backend::DirectoryPrefixView => {
            let WithTempDir { directory, value } = directory_storage();
            WithTempDir {
                directory,
                value: Arc::new(SubStorage::new(Key::new("repos/maven"), value)),
            }
        }
    }
}

#[fixture]
pub fn memory_storage() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

#[fixture]
pub fn directory() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Return a buffer containing `size` random bytes for testing purposes.
pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut rng = SmallRng::from_entropy();
    let mut buffer = vec![0u8; size];
    rng.fill_bytes(&mut buffer);
    buffer
}

/// A memory storage whose `exists` always answers `true`, like a storage where every value is
/// deleted right after it was found.
#[derive(Debug, Default)]
pub struct VanishingStorage(MemoryStorage);

#[async_trait]
impl Storage for VanishingStorage {
    async fn exists(&self, _key: &Key) -> Result<bool> {
        Ok(true)
    }

    async fn save(&self, key: &Key, content: Content) -> Result<()> {
        self.0.save(key, content).await
    }

    async fn value(&self, key: &Key) -> Result<Content> {
        self.0.value(key).await
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.0.delete(key).await
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        self.0.list(prefix).await
    }

    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        self.0.move_value(source, destination).await
    }

    async fn metadata(&self, key: &Key) -> Result<Meta> {
        self.0.metadata(key).await
    }

    fn acquire(&self, key: &Key) -> Result<Ticket> {
        self.0.acquire(key)
    }
}
