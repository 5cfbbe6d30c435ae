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

use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use static_assertions::assert_obj_safe;
use tracing::debug;

use super::ticket::Ticket;
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::Meta;

/// An asynchronous key-value store for the bytes of artifacts.
///
/// A `Storage` maps [`Key`] values to bytes. Every backend in this crate implements this trait
/// with the same semantics, and the [`verification`] module checks them.
///
/// No value can be stored at [`Key::ROOT`]. Keys which only have descendants are not values:
/// `exists` returns `false` for them and `delete` refuses them.
///
/// # Atomicity
/// `save` and `move_value` are atomic. If the content passed to `save` fails partway through,
/// the key keeps whatever value it had before, or stays absent.
///
/// # Exclusivity
/// Each storage instance keeps a table of keys which are held exclusively. Use
/// [`StorageExt::exclusively`] to run an operation while holding a key.
///
/// [`verification`]: crate::verification
#[async_trait]
pub trait Storage: fmt::Debug + Send + Sync {
    /// Return whether a value is stored at exactly the given `key`.
    async fn exists(&self, key: &Key) -> Result<bool>;

    /// Store the given `content` at `key`, replacing any existing value.
    ///
    /// # Errors
    /// - `Error::InvalidOperation`: The `key` is the root key.
    /// - `Error::Consumed`: The `content` was already consumed.
    /// - `Error::Io`: The `content` failed or an I/O error occurred. The prior state of `key` is
    /// unchanged.
    async fn save(&self, key: &Key, content: Content) -> Result<()>;

    /// Return the value stored at `key`.
    ///
    /// The returned content reports the size of the stored value.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value at `key`.
    /// - `Error::InvalidOperation`: The `key` is the root key.
    async fn value(&self, key: &Key) -> Result<Content>;

    /// Remove the value stored at `key`.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value at `key`.
    /// - `Error::InvalidOperation`: The `key` is the root key or only has descendants.
    async fn delete(&self, key: &Key) -> Result<()>;

    /// Remove every value at `prefix` or below it.
    ///
    /// Calling this with [`Key::ROOT`] clears the storage. It is not an error if there is nothing
    /// to remove.
    async fn delete_all(&self, prefix: &Key) -> Result<()> {
        for key in self.list(prefix).await? {
            match self.delete(&key).await {
                Err(Error::NotFound(_)) => {}
                result => result?,
            }
        }
        Ok(())
    }

    /// Return the sorted keys of every value at `prefix` or below it.
    async fn list(&self, prefix: &Key) -> Result<Vec<Key>>;

    /// Move the value at `source` to `destination`, replacing any value at `destination`.
    ///
    /// # Errors
    /// - `Error::InvalidOperation`: There is no value at `source`, or either key is the root key.
    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()>;

    /// Return the facts the backend knows about the value at `key`.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value at `key`.
    async fn metadata(&self, key: &Key) -> Result<Meta>;

    /// Return the size in bytes of the value at `key`.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value at `key`.
    async fn size(&self, key: &Key) -> Result<u64> {
        self.metadata(key)
            .await?
            .read(&Meta::OP_SIZE)
            .ok_or_else(|| Error::Store(anyhow!("The storage did not report a size for '{}'.", key)))
    }

    /// Take exclusive access to `key` on this storage instance.
    ///
    /// Access is released when the returned ticket is dropped. Most callers want
    /// [`StorageExt::exclusively`] instead.
    ///
    /// # Errors
    /// - `Error::Locked`: Another ticket for `key` is outstanding.
    fn acquire(&self, key: &Key) -> Result<Ticket>;

    /// A human-readable name for this storage instance.
    fn identifier(&self) -> String {
        type_name::<Self>().to_owned()
    }
}

assert_obj_safe!(Storage);

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn exists(&self, key: &Key) -> Result<bool> {
        self.as_ref().exists(key).await
    }

    async fn save(&self, key: &Key, content: Content) -> Result<()> {
        self.as_ref().save(key, content).await
    }

    async fn value(&self, key: &Key) -> Result<Content> {
        self.as_ref().value(key).await
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.as_ref().delete(key).await
    }

    async fn delete_all(&self, prefix: &Key) -> Result<()> {
        self.as_ref().delete_all(prefix).await
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        self.as_ref().list(prefix).await
    }

    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        self.as_ref().move_value(source, destination).await
    }

    async fn metadata(&self, key: &Key) -> Result<Meta> {
        self.as_ref().metadata(key).await
    }

    async fn size(&self, key: &Key) -> Result<u64> {
        self.as_ref().size(key).await
    }

    fn acquire(&self, key: &Key) -> Result<Ticket> {
        self.as_ref().acquire(key)
    }

    fn identifier(&self) -> String {
        self.as_ref().identifier()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn panicked(key: &Key, payload: Box<dyn Any + Send>) -> Error {
    Error::Store(anyhow!(
        "The exclusive operation on the key '{}' panicked: {}",
        key,
        panic_message(payload.as_ref())
    ))
}

/// Operations provided for every [`Storage`].
pub trait StorageExt: Storage {
    /// Run `operation` while holding exclusive access to `key`.
    ///
    /// Access is taken when this method is called, not when the returned future is first polled.
    /// If another operation already holds `key` on this storage instance, the returned future
    /// resolves to `Error::Locked` without running `operation`. Operations on different keys do
    /// not affect each other.
    ///
    /// Access is released when the operation completes, whether it returns `Ok`, returns `Err`
    /// or panics. A panic, whether it happens while creating the future or while driving it, is
    /// returned as `Error::Store`. Dropping the returned future also releases access.
    ///
    /// # Examples
    /// ```
    /// # use artifact_storage::{Key, Content};
    /// # use artifact_storage::store::{MemoryStorage, Storage, StorageExt};
    /// # futures::executor::block_on(async {
    /// let storage = MemoryStorage::new();
    /// let key = Key::new("index.json");
    /// storage
    ///     .exclusively(&key, |storage| async move {
    ///         storage.save(&Key::new("index.json"), Content::from("{}")).await
    ///     })
    ///     .await?;
    /// assert!(storage.exists(&key).await?);
    /// # Ok::<(), artifact_storage::Error>(())
    /// # }).unwrap();
    /// ```
    fn exclusively<'a, T, F, Fut>(&'a self, key: &Key, operation: F) -> BoxFuture<'a, Result<T>>
    where
        F: FnOnce(&'a Self) -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
        T: Send + 'a,
    {
        let key = key.clone();
        let ticket = self.acquire(&key);
        async move {
            let ticket = ticket?;
            debug!(key = %key, "Acquired exclusive access");
            let result = match panic::catch_unwind(AssertUnwindSafe(|| operation(self))) {
                Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(panicked(&key, payload)),
                },
                Err(payload) => Err(panicked(&key, payload)),
            };
            drop(ticket);
            debug!(key = %key, "Released exclusive access");
            result
        }
        .boxed()
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}
