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

use bytes::Bytes;
use tracing::debug;

use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::store::Storage;

/// Rewrite a value in a storage.
///
/// A pipeline reads the value at one key, hands it to an action which writes the new value, and
/// saves the new value at another key (or the same one). Format adapters use this to update index
/// files like `maven-metadata.xml` or `Packages`.
///
/// The pipeline does not take exclusive access on its own. Run it inside
/// [`StorageExt::exclusively`] when other operations may update the same value.
///
/// [`StorageExt::exclusively`]: crate::store::StorageExt::exclusively
#[derive(Debug)]
pub struct ValuePipeline<'a> {
    storage: &'a dyn Storage,
    read: Key,
    write: Key,
}

impl<'a> ValuePipeline<'a> {
    /// A pipeline which rewrites the value at `key` in place.
    pub fn new(storage: &'a dyn Storage, key: Key) -> Self {
        Self::with_keys(storage, key.clone(), key)
    }

    /// A pipeline which reads the value at `read` and writes the result to `write`.
    pub fn with_keys(storage: &'a dyn Storage, read: Key, write: Key) -> Self {
        ValuePipeline {
            storage,
            read,
            write,
        }
    }

    /// Run `action` on the current value and save what it writes.
    ///
    /// The action receives the current value, or `None` if there is none, and a buffer to write
    /// the new value to.
    ///
    /// # Errors
    /// Any error returned by `action`, in which case nothing is saved, or by the storage.
    pub async fn process<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(Option<Bytes>, &mut Vec<u8>) -> Result<()> + Send,
    {
        self.process_with_result(action).await
    }

    /// Run `action` on the current value, save what it writes and return what it returns.
    ///
    /// # Errors
    /// Any error returned by `action`, in which case nothing is saved, or by the storage.
    pub async fn process_with_result<F, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce(Option<Bytes>, &mut Vec<u8>) -> Result<R> + Send,
        R: Send,
    {
        let current = match self.storage.value(&self.read).await {
            Ok(content) => Some(content.bytes().await?),
            Err(Error::NotFound(_)) => None,
            Err(error) => return Err(error),
        };

        let mut output = Vec::new();
        let result = action(current, &mut output)?;

        debug!(read = %self.read, write = %self.write, size = output.len(), "Rewrote value");
        self.storage.save(&self.write, Content::from(output)).await?;
        Ok(result)
    }
}
