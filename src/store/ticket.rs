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

use std::sync::{Arc, Mutex, Weak};

use weak_table::WeakHashSet;

use crate::error::{Error, Result};
use crate::key::Key;

/// Exclusive access to a key of a [`Storage`].
///
/// The key is released when this value is dropped, whether the operation which held it
/// succeeded, failed or panicked.
///
/// [`Storage`]: crate::store::Storage
#[derive(Debug)]
pub struct Ticket(Arc<Key>);

impl Ticket {
    /// The key this ticket grants exclusive access to.
    pub fn key(&self) -> &Key {
        &self.0
    }
}

/// A value which keeps track of the keys of a storage which are held exclusively.
///
/// Tickets are tracked using weak references, so a key is free again as soon as its [`Ticket`]
/// is dropped. Acquiring a key which is already held fails immediately rather than waiting.
#[derive(Debug, Default)]
pub struct TicketTable(Mutex<WeakHashSet<Weak<Key>>>);

impl TicketTable {
    /// Create a new empty `TicketTable`.
    pub fn new() -> Self {
        Self(Mutex::new(WeakHashSet::new()))
    }

    /// Attempt to acquire a ticket for the given `key`.
    ///
    /// # Errors
    /// - `Error::Locked`: There is already an outstanding ticket for `key`.
    pub fn acquire(&self, key: &Key) -> Result<Ticket> {
        // Checking and inserting under the same guard is what makes acquisition atomic.
        let mut table = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if table.contains(key) {
            Err(Error::Locked(key.clone()))
        } else {
            let key_arc = Arc::new(key.clone());
            table.insert(Arc::clone(&key_arc));
            Ok(Ticket(key_arc))
        }
    }

    /// Return whether there is an outstanding ticket for the given `key`.
    pub fn is_held(&self, key: &Key) -> bool {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key)
    }
}
