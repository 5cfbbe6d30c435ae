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
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::Lock;
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::store::Storage;

/// The key under which the proposals for every target are stored.
const LOCKS_ROOT: &str = ".locks";

/// Encode an expiration time as the text of a proposal.
///
/// A proposal which never expires is empty.
fn encode_expiration(expiration: Option<SystemTime>) -> String {
    match expiration {
        Some(time) => time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis()
            .to_string(),
        None => String::new(),
    }
}

/// Return whether the proposal with the given text is still in force at `now`.
fn is_not_expired(proposal: &Key, text: &str, now: SystemTime) -> Result<bool> {
    if text.is_empty() {
        return Ok(true);
    }
    let millis = text.trim().parse::<u64>().map_err(|_| {
        Error::Store(anyhow!(
            "The lock proposal '{}' has an invalid expiration '{}'.",
            proposal,
            text
        ))
    })?;
    Ok(UNIX_EPOCH + Duration::from_millis(millis) > now)
}

/// A [`Lock`] on a key which is stored as a proposal in a storage.
///
/// Acquiring the lock saves a proposal at `.locks/<target>/<uuid>` which holds its expiration
/// time, then checks the other proposals for the same target. If any of them has not expired, the
/// lock is held by someone else: the own proposal is removed and acquisition fails with
/// `Error::Locked`. Releasing the lock removes the own proposal.
///
/// Acquisition fails rather than waits. Wrap a `StorageLock` in a [`RetryLock`] to retry.
///
/// [`RetryLock`]: crate::lock::RetryLock
#[derive(Debug, Clone)]
pub struct StorageLock {
    storage: Arc<dyn Storage>,
    target: Key,
    uuid: String,
    expiration: Option<SystemTime>,
}

impl StorageLock {
    /// A lock on `target` which never expires.
    pub fn new(storage: Arc<dyn Storage>, target: Key) -> Self {
        Self::with_uuid(storage, target, Uuid::new_v4().to_string(), None)
    }

    /// A lock on `target` which expires at `expiration`.
    pub fn with_expiration(storage: Arc<dyn Storage>, target: Key, expiration: SystemTime) -> Self {
        Self::with_uuid(storage, target, Uuid::new_v4().to_string(), Some(expiration))
    }

    /// A lock on `target` whose proposal is stored under the given `uuid`.
    pub fn with_uuid(
        storage: Arc<dyn Storage>,
        target: Key,
        uuid: impl Into<String>,
        expiration: Option<SystemTime>,
    ) -> Self {
        StorageLock {
            storage,
            target,
            uuid: uuid.into(),
            expiration,
        }
    }

    /// The key under which the proposals for `target` are stored.
    pub fn proposals_root(target: &Key) -> Key {
        Key::new(LOCKS_ROOT).concat(target)
    }

    /// The key of the own proposal of this lock.
    pub fn proposal_key(&self) -> Key {
        Self::proposals_root(&self.target).join(&self.uuid)
    }

    /// Return the text of `proposal` or `None` if it was removed.
    async fn read_proposal(&self, proposal: &Key) -> Result<Option<String>> {
        match self.storage.value(proposal).await {
            Ok(content) => content.text().await.map(Some),
            Err(Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Fail if any other proposal for the target is still in force.
    async fn check_single(&self) -> Result<()> {
        let now = SystemTime::now();
        let root = Self::proposals_root(&self.target);
        let own = self.proposal_key();

        for proposal in self.storage.list(&root).await? {
            // Proposals for descendants of the target are stored further down.
            if proposal == own || proposal.parent().as_ref() != Some(&root) {
                continue;
            }
            // A proposal which disappears between listing and reading was released.
            let text = match self.read_proposal(&proposal).await? {
                Some(text) => text,
                None => continue,
            };
            if is_not_expired(&proposal, &text, now)? {
                debug!(key = %self.target, other = %proposal, "Lock is held by another proposal");
                return Err(Error::Locked(self.target.clone()));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Lock for StorageLock {
    async fn acquire(&self) -> Result<()> {
        let own = self.proposal_key();
        self.storage
            .save(&own, Content::from(encode_expiration(self.expiration).into_bytes()))
            .await?;

        if let Err(error) = self.check_single().await {
            match self.storage.delete(&own).await {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(cleanup_error) => {
                    debug!(proposal = %own, error = %cleanup_error, "Failed to withdraw proposal")
                }
            }
            return Err(error);
        }

        debug!(key = %self.target, uuid = %self.uuid, "Acquired storage lock");
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.storage.delete(&self.proposal_key()).await?;
        debug!(key = %self.target, uuid = %self.uuid, "Released storage lock");
        Ok(())
    }
}
