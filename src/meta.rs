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

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A named fact which can be read from a [`Meta`].
///
/// [`Meta`]: crate::Meta
pub struct MetaField<T> {
    name: &'static str,
    parse: fn(&str) -> Option<T>,
}

impl<T> MetaField<T> {
    /// The name of this field.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for MetaField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MetaField").field(&self.name).finish()
    }
}

fn parse_u64(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

/// Facts a storage backend can observe about a stored value.
///
/// Fields are read by named operation, like `meta.read(&Meta::OP_SIZE)`. Every backend provides
/// [`Meta::OP_SIZE`]; other fields are present only when the backend tracks them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    raw: BTreeMap<&'static str, String>,
}

impl Meta {
    /// The size of the value in bytes.
    pub const OP_SIZE: MetaField<u64> = MetaField {
        name: "size",
        parse: parse_u64,
    };

    /// The time the value was last written, in milliseconds since the Unix epoch.
    pub const OP_UPDATED_AT: MetaField<u64> = MetaField {
        name: "updated-at",
        parse: parse_u64,
    };

    /// Metadata for a value of the given `size`.
    pub fn with_size(size: u64) -> Self {
        let mut raw = BTreeMap::new();
        raw.insert(Self::OP_SIZE.name, size.to_string());
        Meta { raw }
    }

    /// Add the time the value was last written.
    pub fn updated_at(mut self, time: SystemTime) -> Self {
        if let Ok(elapsed) = time.duration_since(UNIX_EPOCH) {
            self.raw
                .insert(Self::OP_UPDATED_AT.name, elapsed.as_millis().to_string());
        }
        self
    }

    /// Read the given `field` or `None` if the backend does not provide it.
    pub fn read<T>(&self, field: &MetaField<T>) -> Option<T> {
        self.raw.get(field.name).and_then(|raw| (field.parse)(raw))
    }

    /// Return an iterator over the names and raw values of all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.raw.iter().map(|(name, value)| (*name, value.as_str()))
    }
}
