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

/// The separator between the segments of a [`Key`].
pub const DELIMITER: char = '/';

/// A hierarchical name of a value in a [`Storage`].
///
/// A key is an ordered sequence of non-empty segments. Its canonical string form joins the
/// segments with `/` and has no leading or trailing separator. Every constructor normalizes its
/// input, so `"/a//b/"` and `"a/b"` produce the same key.
///
/// [`Key::ROOT`] has no segments. It names the whole namespace of a storage and can never hold a
/// value.
///
/// Keys are ordered, compared and hashed by their canonical string form.
///
/// [`Storage`]: crate::store::Storage
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    path: String,
}

impl Key {
    /// The root key.
    pub const ROOT: Key = Key {
        path: String::new(),
    };

    /// Create a key from a `/`-separated path.
    ///
    /// Empty segments are dropped, so a path made only of separators is [`Key::ROOT`].
    pub fn new(path: &str) -> Self {
        Self::from_parts(path.split(DELIMITER))
    }

    /// Create a key from a sequence of parts.
    ///
    /// Each part may itself contain separators; it is split and normalized like [`Key::new`].
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for part in parts {
            for segment in part.as_ref().split(DELIMITER) {
                if segment.is_empty() {
                    continue;
                }
                if !path.is_empty() {
                    path.push(DELIMITER);
                }
                path.push_str(segment);
            }
        }
        Key { path }
    }

    /// Return a new key with `child` appended to this key.
    pub fn join(&self, child: &str) -> Self {
        Self::from_parts([self.path.as_str(), child])
    }

    /// Return a new key with the segments of `other` appended to this key.
    pub fn concat(&self, other: &Key) -> Self {
        self.join(other.as_str())
    }

    /// The canonical string form of this key.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Return whether this is [`Key::ROOT`].
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Return an iterator over the segments of this key.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.path.split(DELIMITER).filter(|part| !part.is_empty())
    }

    /// The last segment of this key or `None` if this is the root.
    pub fn name(&self) -> Option<&str> {
        self.parts().last()
    }

    /// The parent of this key or `None` if this is the root.
    pub fn parent(&self) -> Option<Key> {
        if self.is_root() {
            return None;
        }
        match self.path.rfind(DELIMITER) {
            Some(index) => Some(Key {
                path: self.path[..index].to_owned(),
            }),
            None => Some(Key::ROOT),
        }
    }

    /// Return whether `other` is a strict descendant of this key.
    ///
    /// The root is an ancestor of every other key. Otherwise, `other` must start with this key
    /// followed by a separator, so `a/b` is not an ancestor of `a/bc`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.path.len() > self.path.len()
            && other.path.starts_with(&self.path)
            && other.path.as_bytes()[self.path.len()] == DELIMITER as u8
    }

    /// Return whether `other` is this key or one of its descendants.
    pub fn is_prefix_of(&self, other: &Key) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Return this key relative to `prefix` or `None` if `prefix` is not a prefix of this key.
    pub fn strip_prefix(&self, prefix: &Key) -> Option<Key> {
        if prefix.is_root() {
            Some(self.clone())
        } else if self == prefix {
            Some(Key::ROOT)
        } else if prefix.is_ancestor_of(self) {
            Some(Key {
                path: self.path[prefix.path.len() + 1..].to_owned(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

impl From<&str> for Key {
    fn from(path: &str) -> Self {
        Key::new(path)
    }
}

impl From<String> for Key {
    fn from(path: String) -> Self {
        Key::new(&path)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}
