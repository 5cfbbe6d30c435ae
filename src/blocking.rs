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

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::content::Content;
use crate::error::Result;
use crate::key::Key;
use crate::meta::Meta;
use crate::store::{Storage, StorageExt};

/// A synchronous wrapper around a [`Storage`].
///
/// Every method blocks the calling thread until the operation on the wrapped storage completes.
/// Values are passed as byte slices and returned as vectors.
///
/// A `BlockingStorage` drives its operations on a private single-threaded runtime, so its methods
/// panic if they are called from within an asynchronous context.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use artifact_storage::Key;
/// use artifact_storage::blocking::BlockingStorage;
/// use artifact_storage::store::MemoryStorage;
///
/// let storage = BlockingStorage::new(Arc::new(MemoryStorage::new()))?;
/// storage.save(&Key::new("a/b"), b"data")?;
/// assert_eq!(storage.value(&Key::new("a/b"))?, b"data");
/// # Ok::<(), artifact_storage::Error>(())
/// ```
#[derive(Debug)]
pub struct BlockingStorage {
    storage: Arc<dyn Storage>,
    runtime: Runtime,
}

impl BlockingStorage {
    /// Wrap the given `storage`.
    ///
    /// # Errors
    /// - `Error::Io`: The runtime could not be created.
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(BlockingStorage { storage, runtime })
    }

    /// The wrapped storage.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Return whether a value is stored at exactly the given `key`.
    pub fn exists(&self, key: &Key) -> Result<bool> {
        self.block_on(self.storage.exists(key))
    }

    /// Store `data` at `key`, replacing any existing value.
    pub fn save(&self, key: &Key, data: &[u8]) -> Result<()> {
        self.block_on(self.storage.save(key, Content::from(data.to_vec())))
    }

    /// Return the bytes of the value stored at `key`.
    pub fn value(&self, key: &Key) -> Result<Vec<u8>> {
        self.block_on(async {
            let content = self.storage.value(key).await?;
            Ok(content.bytes().await?.to_vec())
        })
    }

    /// Remove the value stored at `key`.
    pub fn delete(&self, key: &Key) -> Result<()> {
        self.block_on(self.storage.delete(key))
    }

    /// Remove every value at `prefix` or below it.
    pub fn delete_all(&self, prefix: &Key) -> Result<()> {
        self.block_on(self.storage.delete_all(prefix))
    }

    /// Return the sorted keys of every value at `prefix` or below it.
    pub fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        self.block_on(self.storage.list(prefix))
    }

    /// Move the value at `source` to `destination`.
    pub fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        self.block_on(self.storage.move_value(source, destination))
    }

    /// Return the size in bytes of the value at `key`.
    pub fn size(&self, key: &Key) -> Result<u64> {
        self.block_on(self.storage.size(key))
    }

    /// Return the facts the backend knows about the value at `key`.
    pub fn metadata(&self, key: &Key) -> Result<Meta> {
        self.block_on(self.storage.metadata(key))
    }

    /// Run `operation` while holding exclusive access to `key`, blocking until it completes.
    ///
    /// This behaves like [`StorageExt::exclusively`]: the operation receives the wrapped storage
    /// and its future is driven on this wrapper's runtime.
    ///
    /// # Errors
    /// - `Error::Locked`: Another operation holds `key`.
    /// - `Error::Store`: The operation panicked.
    pub fn exclusively<'a, T, F, Fut>(&'a self, key: &Key, operation: F) -> Result<T>
    where
        F: FnOnce(&'a dyn Storage) -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
        T: Send + 'a,
    {
        let storage = self.storage.as_ref();
        self.block_on(storage.exclusively(key, move |storage| operation(storage)))
    }
}
