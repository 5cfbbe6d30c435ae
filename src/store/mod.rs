//! Backends for storing values by key.
//!
//! This module provides the [`Storage`] trait and the backends which implement it. A storage maps
//! [`Key`] values to bytes and offers atomic saves and moves, listing by prefix and per-key
//! exclusive access. Every backend implements the same semantics, so format adapters can be
//! written once and run against any of them.
//!
//! For each backend which opens a resource, there is a corresponding type which provides the
//! necessary configuration to open it. These config types implement [`OpenStorage`]. A
//! [`StorageConfig`] describes a storage in a serializable form, and a [`StoragesCache`] shares
//! opened storages between their consumers.
//!
//! [`Storage`]: crate::store::Storage
//! [`Key`]: crate::Key
//! [`OpenStorage`]: crate::store::OpenStorage
//! [`StorageConfig`]: crate::store::StorageConfig
//! [`StoragesCache`]: crate::store::StoragesCache

pub use self::config::{BackendConfig, LogLevel, StorageConfig};
pub use self::directory_store::{DirectoryConfig, DirectoryStorage};
pub use self::logging_store::LoggingStorage;
pub use self::memory_store::{MemoryConfig, MemoryStorage};
pub use self::open_store::OpenStorage;
pub use self::storage::{Storage, StorageExt};
pub use self::storages_cache::StoragesCache;
pub use self::sub_store::SubStorage;
pub use self::ticket::{Ticket, TicketTable};

mod config;
mod directory_store;
mod logging_store;
mod memory_store;
mod open_store;
mod storage;
mod storages_cache;
mod sub_store;
mod ticket;
