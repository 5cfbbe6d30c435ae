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

#![cfg(feature = "verification")]

use std::sync::Arc;

use rstest::*;

use artifact_storage::store::{MemoryStorage, Storage};
use artifact_storage::{verification, Content, Key};
use common::{open_storage, Backend};

mod common;

macro_rules! verify {
    ($($check:ident),* $(,)?) => {
        $(
            #[rstest]
            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn $check(
                #[values(
                    Backend::Memory,
                    Backend::Directory,
                    Backend::Logging,
                    Backend::MemoryRootView,
                    Backend::MemoryPrefixView,
                    Backend::DirectoryRootView,
                    Backend::DirectoryPrefixView
                )]
                backend: Backend,
            ) {
                let storage = open_storage(backend);
                verification::$check(&**storage).await;
            }
        )*
    };
}

verify!(
    save_and_load,
    save_and_load_chunks,
    save_content_of_unknown_size,
    save_overwrites,
    save_empty_value,
    save_and_load_large,
    failed_save_leaves_key_absent,
    failed_save_keeps_value,
    value_cannot_be_read_twice,
    missing_key_is_not_found,
    root_key_is_rejected,
    parent_of_value_does_not_exist,
    delete_removes_value,
    delete_missing_key_fails,
    delete_parent_fails,
    delete_all_removes_prefix,
    delete_all_root_clears_storage,
    delete_all_of_nothing_succeeds,
    list_in_order,
    list_includes_exact_key,
    list_empty_prefix,
    list_requires_separator,
    move_to_new_key,
    move_overwrites_destination,
    move_missing_source_fails,
    size_matches_saved_bytes,
    exclusively_conflict,
    exclusively_independent_keys,
    exclusively_released_after_success,
    exclusively_released_after_failure,
    exclusively_released_after_panic,
    exclusively_released_when_dropped,
    concurrent_operations,
);

#[rstest]
#[case::memory(Backend::Memory)]
#[case::directory(Backend::Directory)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn verify_all_on_shared_storage(#[case] backend: Backend) {
    let storage = open_storage(backend);
    verification::verify_all((*storage).clone()).await;
}

#[tokio::test]
async fn verify_all_leaves_other_values_alone() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let outside = Key::new("outside");
    storage.save(&outside, Content::from("keep")).await.unwrap();

    verification::verify_all(Arc::clone(&storage)).await;

    assert_eq!(storage.value(&outside).await.unwrap().text().await.unwrap(), "keep");
}
