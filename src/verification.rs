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

//! Behavioral checks for [`Storage`] implementations.
//!
//! Every function in this module takes a storage, exercises one part of the contract and panics
//! if the storage does not honor it. Run each of them against a fresh storage from a test:
//!
//! ```no_run
//! use artifact_storage::store::MemoryStorage;
//! use artifact_storage::verification;
//!
//! #[tokio::test]
//! async fn list_in_order() {
//!     verification::list_in_order(&MemoryStorage::new()).await;
//! }
//! ```
//!
//! The checks use a handful of fixed keys. [`verify_all`] runs every check on its own sub-view of
//! a single storage so they can't see each other's values.
//!
//! [`Storage`]: crate::store::Storage

#![allow(clippy::expect_used, clippy::panic)]

use std::io;
use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream;

use crate::content::Content;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::Meta;
use crate::store::{Storage, StorageExt, SubStorage};

/// Content which yields one byte and then fails.
fn failing_content() -> Content {
    Content::from_stream(stream::iter(vec![
        Ok(Bytes::from_static(b"x")),
        Err(io::Error::new(io::ErrorKind::Other, "content failed partway")),
    ]))
}

async fn read_text(storage: &dyn Storage, key: &Key) -> String {
    storage
        .value(key)
        .await
        .expect("value should succeed")
        .text()
        .await
        .expect("content should be readable")
}

// ============================================================================
// Save and load
// ============================================================================

/// `save` then `value` returns the saved bytes.
pub async fn save_and_load(storage: &dyn Storage) {
    let key = Key::new("shouldSave");
    storage
        .save(&key, Content::from("some data"))
        .await
        .expect("save should succeed");
    assert_eq!(read_text(storage, &key).await, "some data");
}

/// Content made of several chunks is stored as their concatenation.
pub async fn save_and_load_chunks(storage: &dyn Storage) {
    let key = Key::new("chunks/joined");
    storage
        .save(&key, Content::from_chunks(["12", "34", "5"]))
        .await
        .expect("save should succeed");
    assert_eq!(read_text(storage, &key).await, "12345");
}

/// Content of unknown size is stored in full.
pub async fn save_content_of_unknown_size(storage: &dyn Storage) {
    let key = Key::new("unknown/size");
    let chunks = stream::iter(vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"c"))]);
    storage
        .save(&key, Content::from_stream(chunks))
        .await
        .expect("save should succeed");
    assert_eq!(read_text(storage, &key).await, "abc");
    assert_eq!(storage.size(&key).await.expect("size should succeed"), 3);
}

/// `save` replaces an existing value.
pub async fn save_overwrites(storage: &dyn Storage) {
    let key = Key::new("overwritten");
    storage.save(&key, Content::from("original")).await.expect("save");
    storage.save(&key, Content::from("updated")).await.expect("overwrite");
    assert_eq!(read_text(storage, &key).await, "updated");
}

/// An empty value is stored and read back as empty.
pub async fn save_empty_value(storage: &dyn Storage) {
    let key = Key::new("empty");
    storage.save(&key, Content::empty()).await.expect("save");
    assert!(storage.exists(&key).await.expect("exists"));
    assert_eq!(read_text(storage, &key).await, "");
    assert_eq!(storage.size(&key).await.expect("size"), 0);
}

/// A value spanning many read buffers comes back intact.
pub async fn save_and_load_large(storage: &dyn Storage) {
    let key = Key::new("large/value");
    let data = (0..1_048_576u32).map(|index| (index % 251) as u8).collect::<Vec<_>>();
    storage
        .save(&key, Content::from(data.clone()))
        .await
        .expect("save large value");
    let loaded = storage
        .value(&key)
        .await
        .expect("value")
        .bytes()
        .await
        .expect("read large value");
    assert_eq!(loaded.len(), data.len(), "large value length mismatch");
    assert_eq!(loaded.as_ref(), data.as_slice());
}

// ============================================================================
// Save atomicity
// ============================================================================

/// A save whose content fails leaves a new key absent.
pub async fn failed_save_leaves_key_absent(storage: &dyn Storage) {
    let key = Key::new("failed/new");
    let result = storage.save(&key, failing_content()).await;
    assert!(result.is_err(), "save of failing content should fail");
    assert!(
        !storage.exists(&key).await.expect("exists"),
        "failed save must not create the key"
    );
    assert!(storage.list(&Key::new("failed")).await.expect("list").is_empty());
}

/// A save whose content fails keeps the previous value.
pub async fn failed_save_keeps_value(storage: &dyn Storage) {
    let key = Key::new("failed/existing");
    storage.save(&key, Content::from("initial")).await.expect("save");
    let result = storage.save(&key, failing_content()).await;
    assert!(result.is_err(), "save of failing content should fail");
    assert_eq!(read_text(storage, &key).await, "initial");
}

// ============================================================================
// Content consumption
// ============================================================================

/// Reading the same content twice fails the second time.
pub async fn value_cannot_be_read_twice(storage: &dyn Storage) {
    let key = Key::new("once");
    storage.save(&key, Content::from("data")).await.expect("save");
    let content = storage.value(&key).await.expect("value");
    content.bytes().await.expect("first read should succeed");
    assert!(
        matches!(content.bytes().await, Err(Error::Consumed)),
        "second read should fail with Error::Consumed"
    );
}

// ============================================================================
// Not found and root key
// ============================================================================

/// `value`, `size` and `metadata` of an absent key fail with `Error::NotFound`.
pub async fn missing_key_is_not_found(storage: &dyn Storage) {
    let key = Key::new("missing/key");
    let value = storage.value(&key).await;
    assert!(
        matches!(&value, Err(Error::NotFound(not_found)) if *not_found == key),
        "value of missing key: {value:?}"
    );
    let size = storage.size(&key).await;
    assert!(
        matches!(&size, Err(error) if error.is_not_found()),
        "size of missing key: {size:?}"
    );
    let meta = storage.metadata(&key).await;
    assert!(
        matches!(&meta, Err(error) if error.is_not_found()),
        "metadata of missing key: {meta:?}"
    );
}

/// `save`, `value` and `delete` of the root key fail.
pub async fn root_key_is_rejected(storage: &dyn Storage) {
    let save = storage.save(&Key::ROOT, Content::from("root")).await;
    assert!(matches!(save, Err(Error::InvalidOperation(_))), "save root: {save:?}");
    let value = storage.value(&Key::ROOT).await;
    assert!(matches!(value, Err(Error::InvalidOperation(_))), "value root: {value:?}");
    let delete = storage.delete(&Key::ROOT).await;
    assert!(matches!(delete, Err(Error::InvalidOperation(_))), "delete root: {delete:?}");
    assert!(!storage.exists(&Key::ROOT).await.expect("exists root"));
}

// ============================================================================
// Existence
// ============================================================================

/// A key which only has descendants does not exist.
pub async fn parent_of_value_does_not_exist(storage: &dyn Storage) {
    storage
        .save(&Key::from_parts(["parent", "child"]), Content::from("value"))
        .await
        .expect("save");
    assert!(storage.exists(&Key::new("parent/child")).await.expect("exists child"));
    assert!(
        !storage.exists(&Key::new("parent")).await.expect("exists parent"),
        "a parent key must not exist"
    );
}

// ============================================================================
// Delete
// ============================================================================

/// `delete` removes a value.
pub async fn delete_removes_value(storage: &dyn Storage) {
    let key = Key::new("to/delete");
    storage.save(&key, Content::from("doomed")).await.expect("save");
    storage.delete(&key).await.expect("delete");
    assert!(!storage.exists(&key).await.expect("exists"));
    assert!(storage.list(&Key::new("to")).await.expect("list").is_empty());
}

/// `delete` of an absent key fails with `Error::NotFound`.
pub async fn delete_missing_key_fails(storage: &dyn Storage) {
    let result = storage.delete(&Key::new("never/saved")).await;
    assert!(matches!(result, Err(Error::NotFound(_))), "delete missing: {result:?}");
}

/// `delete` of a key which only has descendants fails and removes nothing.
pub async fn delete_parent_fails(storage: &dyn Storage) {
    let child = Key::new("dir/child");
    storage.save(&child, Content::from("value")).await.expect("save");
    let result = storage.delete(&Key::new("dir")).await;
    assert!(
        matches!(result, Err(Error::InvalidOperation(_))),
        "delete parent: {result:?}"
    );
    assert!(storage.exists(&child).await.expect("exists"));
}

// ============================================================================
// Delete all
// ============================================================================

/// `delete_all` removes only the values under its prefix.
pub async fn delete_all_removes_prefix(storage: &dyn Storage) {
    for key in ["p1/one", "p1/two/three", "p2/one", "root"] {
        storage.save(&Key::new(key), Content::from(key)).await.expect("save");
    }
    storage.delete_all(&Key::new("p1")).await.expect("delete all");
    assert_eq!(
        storage.list(&Key::ROOT).await.expect("list"),
        vec![Key::new("p2/one"), Key::new("root")]
    );
}

/// `delete_all` of the root key clears the storage.
pub async fn delete_all_root_clears_storage(storage: &dyn Storage) {
    for key in ["a/b", "c", "d/e/f"] {
        storage.save(&Key::new(key), Content::from(key)).await.expect("save");
    }
    storage.delete_all(&Key::ROOT).await.expect("delete all");
    assert!(storage.list(&Key::ROOT).await.expect("list").is_empty());
}

/// `delete_all` of a prefix with no values succeeds.
pub async fn delete_all_of_nothing_succeeds(storage: &dyn Storage) {
    storage
        .delete_all(&Key::new("nothing/here"))
        .await
        .expect("delete all of nothing should succeed");
}

// ============================================================================
// List
// ============================================================================

/// `list` returns the descendants of its prefix in key order.
pub async fn list_in_order(storage: &dyn Storage) {
    for key in ["1", "a/b/c/1", "a/b/2", "a/z", "z"] {
        storage.save(&Key::new(key), Content::from("data")).await.expect("save");
    }
    assert_eq!(
        storage.list(&Key::new("a/b")).await.expect("list"),
        vec![Key::new("a/b/2"), Key::new("a/b/c/1")]
    );
}

/// `list` includes a value stored at exactly the prefix.
pub async fn list_includes_exact_key(storage: &dyn Storage) {
    let key = Key::new("exact/key");
    storage.save(&key, Content::from("data")).await.expect("save");
    assert_eq!(storage.list(&key).await.expect("list"), vec![key]);
}

/// `list` of a prefix with no values is empty.
pub async fn list_empty_prefix(storage: &dyn Storage) {
    storage.save(&Key::new("elsewhere"), Content::from("data")).await.expect("save");
    assert!(storage.list(&Key::new("nowhere")).await.expect("list").is_empty());
}

/// `list` does not treat a sibling sharing a text prefix as a descendant.
pub async fn list_requires_separator(storage: &dyn Storage) {
    storage.save(&Key::new("pre/fix"), Content::from("1")).await.expect("save");
    storage.save(&Key::new("prefix"), Content::from("2")).await.expect("save");
    assert_eq!(
        storage.list(&Key::new("pre")).await.expect("list"),
        vec![Key::new("pre/fix")]
    );
}

// ============================================================================
// Move
// ============================================================================

/// `move_value` relocates a value to a new key.
pub async fn move_to_new_key(storage: &dyn Storage) {
    let source = Key::new("move/source");
    let destination = Key::new("moved/destination");
    storage.save(&source, Content::from("moving")).await.expect("save");
    storage.move_value(&source, &destination).await.expect("move");
    assert_eq!(read_text(storage, &destination).await, "moving");
    assert!(!storage.exists(&source).await.expect("exists source"));
}

/// `move_value` replaces the value at the destination.
pub async fn move_overwrites_destination(storage: &dyn Storage) {
    let source = Key::new("move/source");
    let destination = Key::new("move/destination");
    storage.save(&source, Content::from("new")).await.expect("save source");
    storage.save(&destination, Content::from("old")).await.expect("save destination");
    storage.move_value(&source, &destination).await.expect("move");
    assert_eq!(read_text(storage, &destination).await, "new");
    assert_eq!(
        storage.list(&Key::new("move")).await.expect("list"),
        vec![destination]
    );
}

/// `move_value` of an absent source fails.
pub async fn move_missing_source_fails(storage: &dyn Storage) {
    let result = storage
        .move_value(&Key::new("absent/source"), &Key::new("absent/destination"))
        .await;
    assert!(
        matches!(result, Err(Error::InvalidOperation(_))),
        "move missing source: {result:?}"
    );
    assert!(!storage.exists(&Key::new("absent/destination")).await.expect("exists"));
}

// ============================================================================
// Size and metadata
// ============================================================================

/// `size` and the size of the stored content equal the number of saved bytes.
pub async fn size_matches_saved_bytes(storage: &dyn Storage) {
    let key = Key::new("sized");
    let data = vec![7u8; 4_321];
    storage.save(&key, Content::from(data)).await.expect("save");
    assert_eq!(storage.size(&key).await.expect("size"), 4_321);
    assert_eq!(storage.value(&key).await.expect("value").size(), Some(4_321));
    let meta = storage.metadata(&key).await.expect("metadata");
    assert_eq!(meta.read(&Meta::OP_SIZE), Some(4_321));
}

// ============================================================================
// Exclusivity
// ============================================================================

/// A second operation on a held key fails without waiting, and the first still completes.
pub async fn exclusively_conflict(storage: &dyn Storage) {
    let key = Key::new("exclusive/conflict");
    let (release, released) = oneshot::channel::<()>();

    let first = storage.exclusively(&key, |storage| async move {
        released
            .await
            .map_err(|_| Error::Store(anyhow!("The release signal was dropped.")))?;
        storage
            .save(&Key::new("exclusive/conflict"), Content::from("first"))
            .await
    });

    let second = storage
        .exclusively(&key, |storage| async move {
            storage
                .save(&Key::new("exclusive/conflict"), Content::from("second"))
                .await
        })
        .await;
    assert!(
        matches!(&second, Err(Error::Locked(locked)) if *locked == key),
        "second operation should fail with Error::Locked: {second:?}"
    );

    release.send(()).expect("first operation should be waiting");
    first.await.expect("first operation should complete");
    assert_eq!(read_text(storage, &key).await, "first");
}

/// An operation on one key does not block an operation on another.
pub async fn exclusively_independent_keys(storage: &dyn Storage) {
    let held = Key::new("exclusive/held");
    let free = Key::new("exclusive/free");
    let (release, released) = oneshot::channel::<()>();

    let first = storage.exclusively(&held, |_| async move {
        released
            .await
            .map_err(|_| Error::Store(anyhow!("The release signal was dropped.")))
    });

    storage
        .exclusively(&free, |storage| async move {
            storage
                .save(&Key::new("exclusive/free"), Content::from("free"))
                .await
        })
        .await
        .expect("operation on a different key should succeed");
    assert_eq!(read_text(storage, &free).await, "free");

    release.send(()).expect("first operation should be waiting");
    first.await.expect("first operation should complete");
}

/// A key is free again after an operation on it succeeds.
pub async fn exclusively_released_after_success(storage: &dyn Storage) {
    let key = Key::new("exclusive/success");
    for _ in 0..3 {
        let value = storage
            .exclusively(&key, |_| async { Ok::<_, Error>(42) })
            .await
            .expect("operation should succeed");
        assert_eq!(value, 42);
    }
}

/// A key is free again after an operation on it fails.
pub async fn exclusively_released_after_failure(storage: &dyn Storage) {
    let key = Key::new("exclusive/failure");
    let failed: Result<()> = storage
        .exclusively(&key, |_| async {
            Err(Error::Store(anyhow!("The operation failed.")))
        })
        .await;
    assert!(matches!(failed, Err(Error::Store(_))), "failure: {failed:?}");
    storage
        .exclusively(&key, |_| async { Ok::<_, Error>(()) })
        .await
        .expect("key should be free after a failure");
}

/// A key is free again after an operation on it panics, and the panic becomes an error.
pub async fn exclusively_released_after_panic(storage: &dyn Storage) {
    let key = Key::new("exclusive/panic");

    let panicked_early = storage
        .exclusively(&key, |_| -> future::Ready<Result<()>> {
            panic!("panicked while creating the operation")
        })
        .await;
    assert!(
        matches!(panicked_early, Err(Error::Store(_))),
        "panic while creating: {panicked_early:?}"
    );

    let panicked_late: Result<()> = storage
        .exclusively(&key, |_| async { panic!("panicked while running the operation") })
        .await;
    assert!(
        matches!(panicked_late, Err(Error::Store(_))),
        "panic while running: {panicked_late:?}"
    );

    storage
        .exclusively(&key, |_| async { Ok::<_, Error>(()) })
        .await
        .expect("key should be free after a panic");
}

/// Dropping an operation before it completes frees its key.
pub async fn exclusively_released_when_dropped(storage: &dyn Storage) {
    let key = Key::new("exclusive/dropped");
    let pending = storage.exclusively(&key, |_| future::pending::<Result<()>>());
    drop(pending);
    storage
        .exclusively(&key, |_| async { Ok::<_, Error>(()) })
        .await
        .expect("key should be free after the operation is dropped");
}

// ============================================================================
// Concurrency
// ============================================================================

/// Saves, deletes, moves and listings running at the same time don't disturb each other.
pub async fn concurrent_operations(storage: &dyn Storage) {
    const COUNT: usize = 16;
    let shared = Key::new("concurrent/shared");
    let moving = Key::new("concurrent/moving");
    let moved = Key::new("concurrent/moved");

    for index in 0..COUNT {
        let name = index.to_string();
        storage
            .save(&shared.join(&name).join("old"), Content::from("old"))
            .await
            .expect("save should succeed");
        storage
            .save(&moving.join(&name), Content::from("moving"))
            .await
            .expect("save should succeed");
    }

    let mut operations: Vec<BoxFuture<'_, Result<()>>> = Vec::new();
    for index in 0..COUNT {
        let name = index.to_string();
        let old = shared.join(&name).join("old");
        let new = shared.join(&name).join("new");
        let source = moving.join(&name);
        let destination = moved.join(&name);
        let listed = shared.clone();
        operations.push(async move { storage.delete(&old).await }.boxed());
        operations.push(async move { storage.save(&new, Content::from("new")).await }.boxed());
        operations.push(async move { storage.move_value(&source, &destination).await }.boxed());
        operations.push(async move { storage.list(&listed).await.map(drop) }.boxed());
    }
    for result in future::join_all(operations).await {
        result.expect("concurrent operation should succeed");
    }

    let mut expected: Vec<Key> = (0..COUNT)
        .map(|index| shared.join(&index.to_string()).join("new"))
        .collect();
    expected.sort();
    assert_eq!(storage.list(&shared).await.expect("list should succeed"), expected);
    assert!(storage.list(&moving).await.expect("list should succeed").is_empty());
    assert_eq!(storage.list(&moved).await.expect("list should succeed").len(), COUNT);
}

// ============================================================================
// Run all
// ============================================================================

/// Run every check, each on its own sub-view of `storage`.
///
/// The sub-views are confined under `verification/<check>`, so `storage` may already hold other
/// values outside of that prefix.
pub async fn verify_all(storage: Arc<dyn Storage>) {
    macro_rules! run {
        ($($check:ident),* $(,)?) => {
            $(
                let prefix = Key::from_parts(["verification", stringify!($check)]);
                $check(&SubStorage::new(prefix, Arc::clone(&storage))).await;
            )*
        };
    }

    run!(
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
}
