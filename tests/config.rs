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
use std::time::Duration;

use rstest::*;
use spectral::prelude::*;
use tempfile::TempDir;

use artifact_storage::store::{BackendConfig, LogLevel, Storage, StorageConfig, StoragesCache};
use artifact_storage::{Content, Error, Key};
use common::{directory, ErrorVariantAssertions};

mod common;

#[test]
fn in_memory_config_deserializes() -> anyhow::Result<()> {
    let config: StorageConfig = serde_json::from_str(r#"{ "type": "in-memory" }"#)?;
    assert_that!(config).is_equal_to(StorageConfig::in_memory());
    Ok(())
}

#[test]
fn fs_config_deserializes() -> anyhow::Result<()> {
    let config: StorageConfig = serde_json::from_str(
        r#"{ "type": "fs", "path": "/var/artifacts", "prefix": "maven", "logging": "debug" }"#,
    )?;

    assert_that!(config.backend).is_equal_to(BackendConfig::Fs {
        path: PathBuf::from("/var/artifacts"),
    });
    assert_that!(config.prefix).is_equal_to(Some(String::from("maven")));
    assert_that!(config.logging).is_equal_to(Some(LogLevel::Debug));
    Ok(())
}

#[test]
fn unknown_type_is_rejected() {
    let result = serde_json::from_str::<StorageConfig>(r#"{ "type": "s3", "bucket": "b" }"#);
    assert_that!(result).is_err();
}

#[test]
fn config_serializes_without_unset_fields() -> anyhow::Result<()> {
    let text = serde_json::to_string(&StorageConfig::in_memory())?;
    assert_that!(text).is_equal_to(String::from(r#"{"type":"in-memory"}"#));
    Ok(())
}

#[test]
fn empty_fs_path_is_a_config_error() {
    let result = StorageConfig::fs("").open();
    assert_that!(result).is_err_variant(Error::Config(String::new()));
}

#[rstest]
#[tokio::test]
async fn prefixed_config_confines_storage(directory: TempDir) {
    let root = directory.path().join("storage");
    let prefixed = StorageConfig::fs(&root)
        .with_prefix("maven")
        .with_logging(LogLevel::Trace)
        .open()
        .unwrap();
    prefixed
        .save(&Key::new("lib/1.0/lib.jar"), Content::from("jar"))
        .await
        .unwrap();

    let whole = StorageConfig::fs(&root).open().unwrap();
    assert_that!(whole.list(&Key::ROOT).await.unwrap())
        .is_equal_to(vec![Key::new("maven/lib/1.0/lib.jar")]);
}

#[test]
fn cache_returns_same_storage() {
    let cache = StoragesCache::new(Duration::from_secs(60));
    let config = StorageConfig::in_memory();

    let first = cache.storage(&config).unwrap();
    let second = cache.storage(&config).unwrap();

    assert_that!(Arc::ptr_eq(&first, &second)).is_true();
    assert_that!(cache.len()).is_equal_to(1);
}

#[test]
fn cache_keys_by_whole_config() {
    let cache = StoragesCache::new(Duration::from_secs(60));

    let plain = cache.storage(&StorageConfig::in_memory()).unwrap();
    let prefixed = cache
        .storage(&StorageConfig::in_memory().with_prefix("npm"))
        .unwrap();

    assert_that!(Arc::ptr_eq(&plain, &prefixed)).is_false();
    assert_that!(cache.len()).is_equal_to(2);
}

#[tokio::test(start_paused = true)]
async fn cache_entries_expire() {
    let cache = StoragesCache::new(Duration::from_secs(60));
    let config = StorageConfig::in_memory();
    let first = cache.storage(&config).unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    assert_that!(Arc::ptr_eq(&first, &cache.storage(&config).unwrap())).is_true();

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_that!(cache.len()).is_equal_to(0);
    assert_that!(Arc::ptr_eq(&first, &cache.storage(&config).unwrap())).is_false();
}

#[test]
fn invalidate_removes_entry() {
    let cache = StoragesCache::new(Duration::from_secs(60));
    let config = StorageConfig::in_memory();
    let first = cache.storage(&config).unwrap();

    assert_that!(cache.invalidate(&config)).is_true();
    assert_that!(cache.invalidate(&config)).is_false();
    assert_that!(Arc::ptr_eq(&first, &cache.storage(&config).unwrap())).is_false();

    cache.invalidate_all();
    assert_that!(cache.is_empty()).is_true();
}

#[test]
fn failed_open_is_not_cached() {
    let cache = StoragesCache::new(Duration::from_secs(60));

    assert_that!(cache.storage(&StorageConfig::fs(""))).is_err();
    assert_that!(cache.is_empty()).is_true();
}
