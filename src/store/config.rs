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

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Level;

use super::directory_store::DirectoryConfig;
use super::logging_store::LoggingStorage;
use super::memory_store::MemoryConfig;
use super::open_store::OpenStorage;
use super::storage::Storage;
use super::sub_store::SubStorage;
use crate::error::{Error, Result};
use crate::key::Key;

/// The backend selected by a [`StorageConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackendConfig {
    /// A [`MemoryStorage`] which starts out empty.
    ///
    /// [`MemoryStorage`]: crate::store::MemoryStorage
    InMemory,

    /// A [`DirectoryStorage`] rooted at `path`.
    ///
    /// [`DirectoryStorage`]: crate::store::DirectoryStorage
    Fs {
        /// The path of the root directory.
        path: PathBuf,
    },
}

/// The level a [`StorageConfig`] logs operations at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// A serializable description of a storage.
///
/// This is the form a configuration layer hands to this crate, for example:
///
/// ```json
/// { "type": "fs", "path": "/var/artifacts", "prefix": "maven", "logging": "debug" }
/// ```
///
/// Opening the config builds the backend, wraps it in a [`LoggingStorage`] if `logging` is set
/// and then in a [`SubStorage`] if `prefix` is set.
///
/// [`LoggingStorage`]: crate::store::LoggingStorage
/// [`SubStorage`]: crate::store::SubStorage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The backend to open.
    #[serde(flatten)]
    pub backend: BackendConfig,

    /// The key the storage is confined under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// The level to log every operation at, or `None` to not log them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LogLevel>,
}

impl StorageConfig {
    /// A config for an empty in-memory storage.
    pub fn in_memory() -> Self {
        Self::from(BackendConfig::InMemory)
    }

    /// A config for a storage in the directory at `path`.
    pub fn fs(path: impl Into<PathBuf>) -> Self {
        Self::from(BackendConfig::Fs { path: path.into() })
    }

    /// Confine the storage under `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Log every operation at `level`.
    pub fn with_logging(mut self, level: LogLevel) -> Self {
        self.logging = Some(level);
        self
    }

    /// Open the storage this config describes.
    ///
    /// # Errors
    /// - `Error::Config`: The config is invalid.
    /// - `Error::Store`: The storage could not be created.
    /// - `Error::Io`: An I/O error occurred.
    pub fn open(&self) -> Result<Arc<dyn Storage>> {
        let mut storage: Arc<dyn Storage> = match &self.backend {
            BackendConfig::InMemory => Arc::new(MemoryConfig::new().open()?),
            BackendConfig::Fs { path } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::Config(String::from(
                        "The path of an 'fs' storage must not be empty.",
                    )));
                }
                Arc::new(DirectoryConfig { path: path.clone() }.open()?)
            }
        };

        if let Some(level) = self.logging {
            storage = Arc::new(LoggingStorage::with_level(level.into(), storage));
        }

        if let Some(prefix) = &self.prefix {
            storage = Arc::new(SubStorage::new(Key::new(prefix), storage));
        }

        Ok(storage)
    }
}

impl From<BackendConfig> for StorageConfig {
    fn from(backend: BackendConfig) -> Self {
        StorageConfig {
            backend,
            prefix: None,
            logging: None,
        }
    }
}
