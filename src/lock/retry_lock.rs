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
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::Lock;
use crate::error::Result;

/// The number of times an operation is attempted.
const MAX_ATTEMPTS: u32 = 3;

/// The delay before the second attempt.
const INITIAL_DELAY: Duration = Duration::from_millis(500);

/// The factor the delay grows by after each attempt.
const DELAY_MULTIPLIER: f64 = 1.5;

/// A [`Lock`] which retries acquiring and releasing another lock.
///
/// Each operation is attempted up to three times. The second attempt happens 500ms after the
/// first and the third 750ms after the second. The error of the last attempt is returned.
#[derive(Debug, Clone)]
pub struct RetryLock<L> {
    origin: L,
}

impl<L: Lock> RetryLock<L> {
    /// Retry the operations of `origin`.
    pub fn new(origin: L) -> Self {
        RetryLock { origin }
    }

    /// The lock whose operations are retried.
    pub fn origin(&self) -> &L {
        &self.origin
    }

    async fn retry<'a, F, Fut>(&'a self, operation: &str, mut attempt: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send + 'a,
    {
        let mut delay = INITIAL_DELAY;
        let mut attempts = 1;
        loop {
            match attempt().await {
                Ok(()) => return Ok(()),
                Err(error) if attempts >= MAX_ATTEMPTS => return Err(error),
                Err(error) => {
                    warn!(operation, attempts, error = %error, "Lock operation failed, retrying");
                }
            }
            tokio::time::sleep(delay).await;
            delay = delay.mul_f64(DELAY_MULTIPLIER);
            attempts += 1;
        }
    }
}

#[async_trait]
impl<L: Lock> Lock for RetryLock<L> {
    async fn acquire(&self) -> Result<()> {
        self.retry("acquire", || self.origin.acquire()).await
    }

    async fn release(&self) -> Result<()> {
        self.retry("release", || self.origin.release()).await
    }
}
