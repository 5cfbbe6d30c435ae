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

use super::storage::Storage;

/// A value which can be used to open a `Storage`.
pub trait OpenStorage {
    /// The type of `Storage` which this value can be used to open.
    type Storage: Storage + 'static;

    /// Open or create a storage of type `Storage`.
    ///
    /// This opens the storage, creating it if it does not already exist.
    ///
    /// # Errors
    /// - `Error::Store`: The storage could not be created.
    /// - `Error::Io`: An I/O error occurred.
    fn open(&self) -> crate::Result<Self::Storage>;
}
