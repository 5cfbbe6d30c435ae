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

use std::io;
use std::result;

use thiserror::Error as DeriveError;

use crate::key::Key;

/// The error type for operations with a storage.
#[derive(Debug, DeriveError)]
pub enum Error {
    /// There is no value stored at the given key.
    #[error("No value is stored at the key '{0}'.")]
    NotFound(Key),

    /// The requested operation is not allowed on the given arguments.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Exclusive access to the given key is already held.
    #[error("Exclusive access to the key '{0}' is already held.")]
    Locked(Key),

    /// The content was already consumed.
    #[error("The content was already consumed.")]
    Consumed,

    /// The storage configuration is invalid.
    #[error("Invalid storage configuration: {0}")]
    Config(String),

    /// An error occurred with the storage backend.
    #[error("{0}")]
    Store(anyhow::Error),

    /// An I/O error occurred.
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Return whether this error means that no value is stored at a key.
    ///
    /// Callers use this to tell a missing value apart from a failure of the storage medium.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Return whether this error is an exclusivity conflict.
    pub fn is_locked(&self) -> bool {
        matches!(self, Error::Locked(_))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidOperation(message.into())
    }
}

/// The result type for operations with a storage.
pub type Result<T> = result::Result<T, Error>;
