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

use std::fmt::Debug;
use std::mem::discriminant;

use spectral::{AssertionFailure, Spec};

use artifact_storage::{Error, Key, Result};

/// Assertions on the error variant of an `artifact_storage::Result`.
pub trait ErrorVariantAssertions {
    fn is_err_variant(&self, expected_value: Error);

    fn is_not_found_at(&self, key: &Key);
}

impl<'a, T> ErrorVariantAssertions for Spec<'a, Result<T>>
where
    T: Debug,
{
    fn is_err_variant(&self, expected_value: Error) {
        match self.subject {
            Ok(ref value) => {
                AssertionFailure::from_spec(self)
                    .with_expected(format!("Err({:?})", expected_value))
                    .with_actual(format!("Ok({:?})", value))
                    .fail();
            }
            Err(ref error) if discriminant(error) != discriminant(&expected_value) => {
                AssertionFailure::from_spec(self)
                    .with_expected(format!("Err({:?})", expected_value))
                    .with_actual(format!("Err({:?})", error))
                    .fail();
            }
            Err(_) => {}
        }
    }

    fn is_not_found_at(&self, key: &Key) {
        match self.subject {
            Err(Error::NotFound(ref actual)) if actual == key => {}
            ref other => {
                AssertionFailure::from_spec(self)
                    .with_expected(format!("Err(NotFound({:?}))", key))
                    .with_actual(format!("{:?}", other))
                    .fail();
            }
        }
    }
}
