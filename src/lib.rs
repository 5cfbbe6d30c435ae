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

//! `artifact-storage` is an asynchronous key-value storage layer for artifact repositories.
//!
//! Package format adapters (Maven, NuGet, Debian and others) keep their artifacts and index files
//! in a [`Storage`]. This crate provides the storage contract and a set of backends which all
//! implement it with the same semantics:
//! - Values are addressed by hierarchical [`Key`]s and can be listed by prefix.
//! - Saves and moves are atomic. A save whose content fails leaves the previous value in place.
//! - Values are read and written as [`Content`], a stream of chunks which can be consumed once.
//! - Operations can take exclusive access to a key with [`StorageExt::exclusively`].
//!
//! The following backends are provided out of the box:
//! - `MemoryStorage` stores values in memory.
//! - `DirectoryStorage` stores values in a directory in the local file system.
//! - `SubStorage` confines another storage under a key prefix.
//! - `LoggingStorage` logs every operation on another storage.
//!
//! On top of the contract, the [`lock`] module provides locks which are shared through a storage,
//! the [`cache`] module caches remote content, [`ValuePipeline`] rewrites values in place and
//! [`BlockingStorage`] offers a synchronous interface.
//!
//! # Examples
//! ```
//! use artifact_storage::{Content, Key};
//! use artifact_storage::store::{MemoryStorage, Storage, StorageExt};
//!
//! # futures::executor::block_on(async {
//! let storage = MemoryStorage::new();
//!
//! // Save a value and read it back.
//! let key = Key::new("com/example/lib/1.0/lib-1.0.jar");
//! storage.save(&key, Content::from("jar bytes")).await?;
//! assert_eq!(storage.value(&key).await?.text().await?, "jar bytes");
//!
//! // List everything under a prefix.
//! assert_eq!(storage.list(&Key::new("com/example")).await?, vec![key.clone()]);
//!
//! // Update an index while holding exclusive access to it.
//! let index = Key::new("com/example/lib/maven-metadata.xml");
//! storage
//!     .exclusively(&index, |storage| async move {
//!         let index = Key::new("com/example/lib/maven-metadata.xml");
//!         storage.save(&index, Content::from("<metadata/>")).await
//!     })
//!     .await?;
//! # Ok::<(), artifact_storage::Error>(())
//! # }).unwrap();
//! ```
//!
//! # Features
//! Some functionality is gated behind cargo features:
//!
//! Module | Cargo Feature
//! --- | ---
//! `verification` | `verification`
//!
//! The `verification` feature is enabled by default.
//!
//! [`Storage`]: crate::store::Storage
//! [`StorageExt::exclusively`]: crate::store::StorageExt::exclusively
//! [`ValuePipeline`]: crate::pipeline::ValuePipeline
//! [`BlockingStorage`]: crate::blocking::BlockingStorage

pub use bytes;

pub use content::{ByteStream, Content};
pub use error::{Error, Result};
pub use key::Key;
pub use meta::{Meta, MetaField};

mod content;
mod error;
mod key;
mod meta;

pub mod blocking;
pub mod cache;
pub mod lock;
pub mod pipeline;
pub mod store;
#[cfg(feature = "verification")]
#[cfg_attr(docsrs, doc(cfg(feature = "verification")))]
pub mod verification;
