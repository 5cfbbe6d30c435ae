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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use rstest::*;
use spectral::prelude::*;

use artifact_storage::cache::{CacheControl, FromStorageCache, Remote};
use artifact_storage::store::{MemoryStorage, Storage};
use artifact_storage::{Content, Error, Key, Result};
use common::{memory_storage, ErrorVariantAssertions, VanishingStorage};

mod common;

#[derive(Debug, Clone, Copy)]
enum Response {
    Text(&'static str),
    Missing,
    Failing,
    BrokenStream,
}

#[derive(Debug)]
struct FakeRemote {
    response: Response,
    calls: AtomicUsize,
}

impl FakeRemote {
    fn new(response: Response) -> Self {
        FakeRemote {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn get(&self) -> Result<Option<Content>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.response {
            Response::Text(text) => Ok(Some(Content::from(text))),
            Response::Missing => Ok(None),
            Response::Failing => Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "upstream is down",
            ))),
            Response::BrokenStream => Ok(Some(Content::from_stream(stream::iter(vec![
                Ok(Bytes::from_static(b"half")),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            ])))),
        }
    }
}

async fn text(content: Option<Content>) -> String {
    content.unwrap().text().await.unwrap()
}

fn artifact() -> Key {
    Key::new("org/example/lib/1.0/lib-1.0.jar")
}

#[rstest]
#[tokio::test]
async fn miss_fetches_and_caches(memory_storage: Arc<MemoryStorage>) {
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::Text("remote"));

    let content = cache.load(&artifact(), &remote, CacheControl::Always).await.unwrap();

    assert_that!(text(content).await).is_equal_to(String::from("remote"));
    assert_that!(remote.calls()).is_equal_to(1);
    assert_that!(memory_storage.exists(&artifact()).await.unwrap()).is_true();
}

#[rstest]
#[tokio::test]
async fn hit_does_not_ask_remote(memory_storage: Arc<MemoryStorage>) {
    memory_storage.save(&artifact(), Content::from("cached")).await.unwrap();
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::Text("remote"));

    let content = cache.load(&artifact(), &remote, CacheControl::Always).await.unwrap();

    assert_that!(text(content).await).is_equal_to(String::from("cached"));
    assert_that!(remote.calls()).is_equal_to(0);
}

#[rstest]
#[tokio::test]
async fn no_cache_refreshes_copy(memory_storage: Arc<MemoryStorage>) {
    memory_storage.save(&artifact(), Content::from("stale")).await.unwrap();
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::Text("fresh"));

    let content = cache.load(&artifact(), &remote, CacheControl::NoCache).await.unwrap();

    assert_that!(text(content).await).is_equal_to(String::from("fresh"));
    assert_that!(memory_storage.value(&artifact()).await.unwrap().text().await.unwrap())
        .is_equal_to(String::from("fresh"));
}

#[rstest]
#[tokio::test]
async fn failing_remote_falls_back_to_copy(memory_storage: Arc<MemoryStorage>) {
    memory_storage.save(&artifact(), Content::from("cached")).await.unwrap();
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::Failing);

    let content = cache.load(&artifact(), &remote, CacheControl::NoCache).await.unwrap();

    assert_that!(text(content).await).is_equal_to(String::from("cached"));
    assert_that!(remote.calls()).is_equal_to(1);
}

#[rstest]
#[tokio::test]
async fn failing_remote_without_copy_is_an_error(memory_storage: Arc<MemoryStorage>) {
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::Failing);

    assert_that!(cache.load(&artifact(), &remote, CacheControl::Always).await)
        .is_err_variant(Error::Io(io::Error::from(io::ErrorKind::Other)));
}

#[rstest]
#[tokio::test]
async fn missing_on_remote_is_none(memory_storage: Arc<MemoryStorage>) {
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::Missing);

    let content = cache.load(&artifact(), &remote, CacheControl::Always).await.unwrap();

    assert_that!(content.is_none()).is_true();
    assert_that!(memory_storage.list(&Key::ROOT).await.unwrap()).is_empty();
}

#[rstest]
#[tokio::test]
async fn broken_stream_is_not_cached(memory_storage: Arc<MemoryStorage>) {
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::BrokenStream);

    assert_that!(cache.load(&artifact(), &remote, CacheControl::Always).await).is_err();
    assert_that!(memory_storage.exists(&artifact()).await.unwrap()).is_false();
}

#[rstest]
#[tokio::test]
async fn broken_stream_keeps_previous_copy(memory_storage: Arc<MemoryStorage>) {
    memory_storage.save(&artifact(), Content::from("cached")).await.unwrap();
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = FakeRemote::new(Response::BrokenStream);

    assert_that!(cache.load(&artifact(), &remote, CacheControl::NoCache).await).is_err();
    assert_that!(memory_storage.value(&artifact()).await.unwrap().text().await.unwrap())
        .is_equal_to(String::from("cached"));
}

#[rstest]
#[tokio::test]
async fn closure_is_a_remote(memory_storage: Arc<MemoryStorage>) {
    let cache = FromStorageCache::new(memory_storage.clone());
    let remote = || async { Ok::<_, Error>(Some(Content::from("from closure"))) };

    let content = cache.load(&artifact(), &remote, CacheControl::Always).await.unwrap();

    assert_that!(text(content).await).is_equal_to(String::from("from closure"));
}

#[tokio::test]
async fn copy_gone_after_check_is_fetched() {
    let cache = FromStorageCache::new(Arc::new(VanishingStorage::default()));
    let remote = FakeRemote::new(Response::Text("remote"));

    let content = cache.load(&artifact(), &remote, CacheControl::Always).await.unwrap();

    assert_that!(text(content).await).is_equal_to(String::from("remote"));
    assert_that!(remote.calls()).is_equal_to(1);
}

#[tokio::test]
async fn failing_remote_with_copy_gone_is_an_error() {
    let cache = FromStorageCache::new(Arc::new(VanishingStorage::default()));
    let remote = FakeRemote::new(Response::Failing);

    let result = cache.load(&artifact(), &remote, CacheControl::NoCache).await;

    assert_that!(result).is_err_variant(Error::Io(io::Error::from(io::ErrorKind::Other)));
}
