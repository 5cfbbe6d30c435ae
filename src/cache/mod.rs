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

//! Caching of remote content in a storage.
//!
//! Proxy repositories fetch artifacts from an upstream server and keep a copy so they can serve
//! it again without asking. A [`Remote`] fetches the content, a [`CacheControl`] decides whether a
//! copy is still good, and a [`FromStorageCache`] ties them together.

use std::future::Future;

use async_trait::async_trait;

use crate::content::Content;

pub use self::from_storage::FromStorageCache;

mod from_storage;

/// A source of content outside of the storage.
///
/// Closures returning a future implement this trait.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Fetch the content, or return `None` if the remote does not have it.
    async fn get(&self) -> crate::Result<Option<Content>>;
}

#[async_trait]
impl<F, Fut> Remote for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = crate::Result<Option<Content>>> + Send,
{
    async fn get(&self) -> crate::Result<Option<Content>> {
        self().await
    }
}

/// Whether a cached copy can be served without asking the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheControl {
    /// A cached copy is always served.
    Always,

    /// The remote is always asked first. The cached copy is only served if the remote fails.
    NoCache,
}
