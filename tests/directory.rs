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

use std::fs;
use std::sync::Arc;

use rstest::*;
use spectral::prelude::*;
use tempfile::TempDir;

use artifact_storage::store::{DirectoryConfig, MemoryConfig, OpenStorage, Storage, StorageExt};
use artifact_storage::{Content, Error, Key, Meta};
use common::{directory, random_bytes, ErrorVariantAssertions};

mod common;

fn config(directory: &TempDir) -> DirectoryConfig {
    DirectoryConfig {
        path: directory.path().join("storage"),
    }
}

#[rstest]
#[tokio::test]
async fn values_persist_across_opens(directory: TempDir) {
    let data = random_bytes(4096);
    let key = Key::new("org/example/lib.jar");
    {
        let storage = config(&directory).open().unwrap();
        storage.save(&key, Content::from(data.clone())).await.unwrap();
    }

    let storage = config(&directory).open().unwrap();
    let value = storage.value(&key).await.unwrap();
    assert_that!(value.size()).is_equal_to(Some(4096));
    assert_that!(value.bytes().await.unwrap().to_vec()).is_equal_to(data);
}

#[rstest]
#[tokio::test]
async fn files_mirror_keys(directory: TempDir) {
    let storage = config(&directory).open().unwrap();
    storage.save(&Key::new("a/b/c.txt"), Content::from("text")).await.unwrap();

    let path = storage.path().join("a").join("b").join("c.txt");
    assert_that!(fs::read_to_string(path).unwrap()).is_equal_to(String::from("text"));
}

#[rstest]
fn open_clears_stale_staging_files(directory: TempDir) {
    let config = config(&directory);
    config.open().unwrap();
    let stale = config.path.join(".staging").join("interrupted");
    fs::write(&stale, b"partial").unwrap();

    config.open().unwrap();

    assert_that!(stale.exists()).is_false();
}

#[rstest]
#[tokio::test]
async fn staging_directory_is_not_listed(directory: TempDir) {
    let storage = config(&directory).open().unwrap();
    storage.save(&Key::new("value"), Content::from("v")).await.unwrap();

    assert_that!(storage.list(&Key::ROOT).await.unwrap()).is_equal_to(vec![Key::new("value")]);
}

#[rstest]
#[case::staging(".staging/file")]
#[case::parent("a/../b")]
#[case::current("a/./b")]
#[tokio::test]
async fn unsafe_keys_are_rejected(directory: TempDir, #[case] key: &str) {
    let storage = config(&directory).open().unwrap();
    assert_that!(storage.save(&Key::new(key), Content::from("v")).await)
        .is_err_variant(Error::InvalidOperation(String::new()));
}

#[rstest]
#[tokio::test]
async fn delete_removes_empty_directories(directory: TempDir) {
    let storage = config(&directory).open().unwrap();
    storage.save(&Key::new("a/b/c"), Content::from("1")).await.unwrap();
    storage.save(&Key::new("a/d"), Content::from("2")).await.unwrap();

    storage.delete(&Key::new("a/b/c")).await.unwrap();

    assert_that!(storage.path().join("a").join("b").exists()).is_false();
    assert_that!(storage.path().join("a").exists()).is_true();
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deleting_sibling_does_not_break_save(directory: TempDir) {
    let storage = Arc::new(config(&directory).open().unwrap());

    for round in 0..300 {
        let existing = Key::new(&format!("pkg{}/a", round));
        let added = Key::new(&format!("pkg{}/b", round));
        storage.save(&existing, Content::from("a")).await.unwrap();

        let deleting = {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move { storage.delete(&existing).await })
        };
        let saving = {
            let storage = Arc::clone(&storage);
            let added = added.clone();
            tokio::spawn(async move { storage.save(&added, Content::from("b")).await })
        };

        deleting.await.unwrap().unwrap();
        saving.await.unwrap().unwrap();
        assert_that!(storage.exists(&added).await.unwrap()).is_true();
    }
}

#[rstest]
#[tokio::test]
async fn metadata_reports_size_and_time(directory: TempDir) {
    let storage = config(&directory).open().unwrap();
    let key = Key::new("meta");
    storage.save(&key, Content::from("12345")).await.unwrap();

    let meta = storage.metadata(&key).await.unwrap();
    assert_that!(meta.read(&Meta::OP_SIZE)).is_equal_to(Some(5));
    assert_that!(meta.read(&Meta::OP_UPDATED_AT)).is_some();
}

#[rstest]
#[tokio::test]
async fn exclusivity_is_per_instance(directory: TempDir) {
    let first = config(&directory).open().unwrap();
    let second = config(&directory).open().unwrap();
    let key = Key::new("index");

    let _ticket = first.acquire(&key).unwrap();

    assert_that!(first.acquire(&key)).is_err_variant(Error::Locked(Key::ROOT));
    let result = second.exclusively(&key, |_| async { Ok::<_, Error>(()) }).await;
    assert_that!(result).is_ok();
}

#[tokio::test]
async fn memory_config_shares_values() {
    let config = MemoryConfig::new();
    let first = config.open().unwrap();
    let second = config.open().unwrap();

    first.save(&Key::new("shared"), Content::from("v")).await.unwrap();

    assert_that!(second.exists(&Key::new("shared")).await.unwrap()).is_true();
    assert_that!(second.acquire(&Key::new("k"))).is_ok();
}
