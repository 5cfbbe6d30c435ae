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
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, TryStreamExt};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::open_store::OpenStorage;
use super::storage::Storage;
use super::ticket::{Ticket, TicketTable};
use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::Meta;

/// The directory where values are written before they are moved into place.
///
/// This name is reserved as the first segment of a key.
const STAGING_DIRECTORY: &str = ".staging";

/// The size of the chunks values are read in.
const CHUNK_SIZE: usize = 64 * 1024;

/// The configuration for opening a [`DirectoryStorage`].
///
/// [`DirectoryStorage`]: crate::store::DirectoryStorage
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DirectoryConfig {
    /// The path of the root directory of the storage.
    pub path: PathBuf,
}

impl OpenStorage for DirectoryConfig {
    type Storage = DirectoryStorage;

    fn open(&self) -> crate::Result<Self::Storage> {
        let staging_path = self.path.join(STAGING_DIRECTORY);
        std::fs::create_dir_all(&staging_path)
            .map_err(|error| crate::Error::Store(anyhow::Error::from(error)))?;

        // Remove any staging files left behind by interrupted writes.
        for entry in std::fs::read_dir(&staging_path)? {
            std::fs::remove_file(entry?.path())?;
        }

        info!(path = %self.path.display(), "Opened directory storage");

        Ok(DirectoryStorage {
            path: self.path.clone(),
            layout: RwLock::new(()),
            tickets: TicketTable::new(),
        })
    }
}

/// A `Storage` which stores values in a directory in the local file system.
///
/// The directory tree mirrors the keys: every segment of a key is a path component and the last
/// one names a regular file holding the raw bytes of the value. Values are written to a staging
/// directory first and then renamed into place, so a failed write never leaves a partial value
/// behind.
///
/// Keys with a `.` or `..` segment are rejected, as are keys whose first segment is `.staging`.
/// Because a path component can't be both a file and a directory, a key can't hold a value while
/// also having descendants.
///
/// You can use [`DirectoryConfig`] to open a storage of this type.
///
/// [`DirectoryConfig`]: crate::store::DirectoryConfig
#[derive(Debug)]
pub struct DirectoryStorage {
    /// The path of the storage's root directory.
    path: PathBuf,

    /// Held shared while a directory is created and filled, and exclusively while empty
    /// directories are removed.
    layout: RwLock<()>,

    tickets: TicketTable,
}

/// Return whether `error` means that a path does not exist.
fn is_missing(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::NotFound {
        return true;
    }

    // `ENOTDIR`: a component of the path is a regular file.
    #[cfg(unix)]
    if error.raw_os_error() == Some(20) {
        return true;
    }

    false
}

/// Read the next chunk of `file`, returning `None` at the end of the file.
async fn read_chunk(mut file: fs::File) -> io::Result<Option<(Bytes, fs::File)>> {
    let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
    if file.read_buf(&mut buffer).await? == 0 {
        Ok(None)
    } else {
        Ok(Some((buffer.freeze(), file)))
    }
}

fn reject_root(key: &Key, operation: &str) -> Result<()> {
    if key.is_root() {
        Err(Error::invalid(format!("Cannot {} the root key.", operation)))
    } else {
        Ok(())
    }
}

impl DirectoryStorage {
    /// The path of the root directory of this storage.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the path where the value with the given `key` is stored.
    fn key_path(&self, key: &Key) -> Result<PathBuf> {
        let mut path = self.path.clone();
        for (index, part) in key.parts().enumerate() {
            if part == "." || part == ".." || (index == 0 && part == STAGING_DIRECTORY) {
                return Err(Error::invalid(format!(
                    "The key '{}' can't be stored in a directory storage.",
                    key
                )));
            }
            path.push(part);
        }
        Ok(path)
    }

    /// Return a new staging path.
    fn staging_path(&self) -> PathBuf {
        let uuid_str = Uuid::new_v4().as_hyphenated().to_string();
        self.path.join(STAGING_DIRECTORY).join(uuid_str)
    }

    /// Return the metadata of `path` or `None` if nothing exists there.
    async fn stat(path: &Path) -> Result<Option<std::fs::Metadata>> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(error) if is_missing(&error) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Write `content` to `staging_path` and move it to `path`, returning the number of bytes.
    async fn stage_and_commit(
        &self,
        staging_path: &Path,
        path: &Path,
        content: Content,
    ) -> Result<u64> {
        let mut stream = content.take_stream()?;
        let mut staging_file = fs::File::create(staging_path).await?;
        let mut size = 0u64;
        while let Some(chunk) = stream.try_next().await? {
            staging_file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        staging_file.flush().await?;
        staging_file.sync_all().await?;
        drop(staging_file);

        self.place(staging_path, path).await?;

        Ok(size)
    }

    /// Move the file at `from` to `to`, creating the parent directories of `to`.
    async fn place(&self, from: &Path, to: &Path) -> io::Result<()> {
        // Pruning can't remove the parent between creating it and renaming into it.
        let _layout = self.layout.read().await;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(from, to).await
    }

    /// Remove the directories above `path` which became empty, stopping at the root directory.
    async fn prune_empty_parents(&self, path: &Path) {
        let _layout = self.layout.write().await;
        let mut current = path.parent();
        while let Some(directory) = current {
            if directory == self.path.as_path() || !directory.starts_with(&self.path) {
                break;
            }
            // This fails for directories which still have entries.
            if fs::remove_dir(directory).await.is_err() {
                break;
            }
            current = directory.parent();
        }
    }
}

#[async_trait]
impl Storage for DirectoryStorage {
    async fn exists(&self, key: &Key) -> Result<bool> {
        if key.is_root() {
            return Ok(false);
        }
        let path = self.key_path(key)?;
        Ok(Self::stat(&path)
            .await?
            .map_or(false, |metadata| metadata.is_file()))
    }

    async fn save(&self, key: &Key, content: Content) -> Result<()> {
        reject_root(key, "save")?;
        let path = self.key_path(key)?;
        let staging_path = self.staging_path();

        match self.stage_and_commit(&staging_path, &path, content).await {
            Ok(size) => {
                debug!(key = %key, size, "Saved value to file");
                Ok(())
            }
            Err(error) => {
                if let Err(cleanup_error) = fs::remove_file(&staging_path).await {
                    if !is_missing(&cleanup_error) {
                        warn!(
                            path = %staging_path.display(),
                            error = %cleanup_error,
                            "Failed to remove staging file"
                        );
                    }
                }
                Err(error)
            }
        }
    }

    async fn value(&self, key: &Key) -> Result<Content> {
        reject_root(key, "read")?;
        let path = self.key_path(key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(error) if is_missing(&error) => return Err(Error::NotFound(key.clone())),
            Err(error) => return Err(error.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(Error::NotFound(key.clone()));
        }

        let chunks = stream::try_unfold(file, read_chunk);
        Ok(Content::from_stream(chunks).with_size(metadata.len()))
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        reject_root(key, "delete")?;
        let path = self.key_path(key)?;

        match Self::stat(&path).await? {
            Some(metadata) if metadata.is_dir() => {
                return Err(Error::invalid(format!(
                    "The key '{}' has no value of its own but has descendants.",
                    key
                )))
            }
            Some(_) => {}
            None => return Err(Error::NotFound(key.clone())),
        }

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(error) if is_missing(&error) => return Err(Error::NotFound(key.clone())),
            Err(error) => return Err(error.into()),
        }
        self.prune_empty_parents(&path).await;

        debug!(key = %key, "Deleted file");
        Ok(())
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>> {
        let prefix_path = self.key_path(prefix)?;

        match Self::stat(&prefix_path).await? {
            Some(metadata) if metadata.is_file() => return Ok(vec![prefix.clone()]),
            Some(_) => {}
            None => return Ok(Vec::new()),
        }

        let mut keys = Vec::new();
        let mut pending = vec![(prefix_path, prefix.clone())];
        while let Some((directory, directory_key)) = pending.pop() {
            let mut entries = match fs::read_dir(&directory).await {
                Ok(entries) => entries,
                // The directory was pruned while we were listing.
                Err(error) if is_missing(&error) => continue,
                Err(error) => return Err(error.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                let name = match file_name.to_str() {
                    Some(name) => name,
                    None => {
                        warn!(path = %entry.path().display(), "Skipping file with a non-UTF-8 name");
                        continue;
                    }
                };
                if directory_key.is_root() && name == STAGING_DIRECTORY {
                    continue;
                }

                let key = directory_key.join(name);
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if file_type.is_file() {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn move_value(&self, source: &Key, destination: &Key) -> Result<()> {
        reject_root(source, "move")?;
        reject_root(destination, "overwrite")?;
        let source_path = self.key_path(source)?;
        let destination_path = self.key_path(destination)?;

        match Self::stat(&source_path).await? {
            Some(metadata) if metadata.is_file() => {}
            _ => {
                return Err(Error::invalid(format!(
                    "Cannot move '{}' because it has no value.",
                    source
                )))
            }
        }

        self.place(&source_path, &destination_path).await?;
        self.prune_empty_parents(&source_path).await;

        debug!(source = %source, destination = %destination, "Moved file");
        Ok(())
    }

    async fn metadata(&self, key: &Key) -> Result<Meta> {
        if key.is_root() {
            return Err(Error::NotFound(key.clone()));
        }
        let path = self.key_path(key)?;

        match Self::stat(&path).await? {
            Some(metadata) if metadata.is_file() => {
                let meta = Meta::with_size(metadata.len());
                Ok(match metadata.modified() {
                    Ok(modified) => meta.updated_at(modified),
                    Err(_) => meta,
                })
            }
            _ => Err(Error::NotFound(key.clone())),
        }
    }

    fn acquire(&self, key: &Key) -> Result<Ticket> {
        self.tickets.acquire(key)
    }

    fn identifier(&self) -> String {
        format!("FS: {}", self.path.display())
    }
}
