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

//! Locks which are shared through a storage.
//!
//! The exclusive access offered by [`StorageExt::exclusively`] only covers a single storage
//! instance. The locks in this module write proposals into the storage itself, so every process
//! which opens the same storage sees them.
//!
//! [`StorageExt::exclusively`]: crate::store::StorageExt::exclusively

use async_trait::async_trait;
use static_assertions::assert_obj_safe;

pub use self::retry_lock::RetryLock;
pub use self::storage_lock::StorageLock;

mod retry_lock;
mod storage_lock;

/// A lock which can be acquired and released asynchronously.
#[async_trait]
pub trait Lock: Send + Sync {
    /// Acquire the lock.
    ///
    /// # Errors
    /// - `Error::Locked`: Someone else holds the lock.
    async fn acquire(&self) -> crate::Result<()>;

    /// Release the lock.
    async fn release(&self) -> crate::Result<()>;
}

assert_obj_safe!(Lock);
