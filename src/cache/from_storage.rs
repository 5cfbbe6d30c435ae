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

use tracing::{debug, warn};

use super::{CacheControl, Remote};
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::store::Storage;

/// A cache which keeps copies of remote content in a storage.
#[derive(Debug, Clone)]
pub struct FromStorageCache {
    storage: Arc<dyn Storage>,
}

impl FromStorageCache {
    /// Create a cache which keeps its copies in `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        FromStorageCache { storage }
    }

    /// Return the content for `key`, from the cache or from `remote`.
    ///
    /// If the storage holds a copy and `control` allows serving it, the copy is returned.
    /// Otherwise the content is fetched from `remote`, saved in the storage and read back from
    /// it. Content which fails while it is being saved is not cached, and the error is returned.
    ///
    /// If `remote` fails while a copy is cached, the copy is returned instead of the error.
    /// This returns `None` if `remote` does not have the content.
    pub async fn load(
        &self,
        key: &Key,
        remote: &dyn Remote,
        control: CacheControl,
    ) -> Result<Option<Content>> {
        if control == CacheControl::Always {
            if let Some(content) = self.cached(key).await? {
                debug!(key = %key, "Serving content from the cache");
                return Ok(Some(content));
            }
        }

        match remote.get().await {
            Ok(Some(content)) => {
                self.storage.save(key, content).await?;
                debug!(key = %key, "Cached content from the remote");
                self.storage.value(key).await.map(Some)
            }
            Ok(None) => Ok(None),
            Err(error) => match self.cached(key).await? {
                Some(content) => {
                    warn!(key = %key, error = %error, "Remote failed, serving content from the cache");
                    Ok(Some(content))
                }
                None => Err(error),
            },
        }
    }

    /// Return the cached copy of `key`, or `None` if there is none.
    async fn cached(&self, key: &Key) -> Result<Option<Content>> {
        match self.storage.value(key).await {
            Ok(content) => Ok(Some(content)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }
}
