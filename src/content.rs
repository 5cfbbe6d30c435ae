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

use std::fmt;
use std::io;
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use futures::Stream;

use crate::error::{Error, Result};

/// A stream of chunks of bytes.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// The bytes of a value, delivered as a stream of chunks which can be consumed only once.
///
/// A `Content` carries an optional size which is known when the producer knows the total number
/// of bytes up front, like when a request declares its length or a storage reads an existing
/// value.
///
/// The chunks are handed out by [`take_stream`]. Any attempt to consume the same content a second
/// time returns [`Error::Consumed`] instead of an empty stream, which exposes code that reads a
/// value twice.
///
/// [`take_stream`]: crate::Content::take_stream
/// [`Error::Consumed`]: crate::Error::Consumed
pub struct Content {
    size: Option<u64>,
    stream: Mutex<Option<ByteStream>>,
}

impl Content {
    fn new(size: Option<u64>, stream: ByteStream) -> Self {
        Content {
            size,
            stream: Mutex::new(Some(stream)),
        }
    }

    /// Content with no bytes.
    pub fn empty() -> Self {
        Self::new(Some(0), stream::empty().boxed())
    }

    /// Content holding the given bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return Self::empty();
        }
        let size = data.len() as u64;
        Self::new(
            Some(size),
            stream::once(async move { Ok::<_, io::Error>(data) }).boxed(),
        )
    }

    /// Content made of the given chunks, delivered in order.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect::<Vec<Bytes>>();
        let size = chunks.iter().map(|chunk| chunk.len() as u64).sum();
        Self::new(
            Some(size),
            stream::iter(chunks.into_iter().map(Ok::<_, io::Error>)).boxed(),
        )
    }

    /// Content of unknown size delivered by the given `stream`.
    ///
    /// If the stream yields an error, whoever consumes this content fails with that error.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::new(None, stream.boxed())
    }

    /// Declare the size of this content without changing its bytes.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// The number of bytes in this content, if it is known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Return whether the stream of this content was already taken.
    pub fn is_consumed(&self) -> bool {
        self.slot().is_none()
    }

    /// Take the stream of chunks of this content.
    ///
    /// # Errors
    /// - `Error::Consumed`: The stream was already taken.
    pub fn take_stream(&self) -> Result<ByteStream> {
        self.slot().take().ok_or(Error::Consumed)
    }

    /// Consume this content and concatenate all of its chunks.
    ///
    /// # Errors
    /// - `Error::Consumed`: The content was already consumed.
    /// - `Error::Io`: The stream of chunks failed.
    pub async fn bytes(&self) -> Result<Bytes> {
        let stream = self.take_stream()?;
        let capacity = self.size.unwrap_or(0) as usize;
        let buffer = stream
            .try_fold(BytesMut::with_capacity(capacity), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await?;
        Ok(buffer.freeze())
    }

    /// Consume this content and decode it as UTF-8.
    ///
    /// # Errors
    /// - `Error::Consumed`: The content was already consumed.
    /// - `Error::Io`: The stream of chunks failed or the bytes are not valid UTF-8.
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|error| Error::Io(io::Error::new(io::ErrorKind::InvalidData, error)))
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ByteStream>> {
        // The slot only ever holds an `Option`, so a poisoned lock leaves it in a usable state.
        self.stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("size", &self.size)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Content {
    fn from(data: Bytes) -> Self {
        Self::from_bytes(data)
    }
}

impl From<Vec<u8>> for Content {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&'static [u8]> for Content {
    fn from(data: &'static [u8]) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&'static str> for Content {
    fn from(data: &'static str) -> Self {
        Self::from_bytes(data)
    }
}
