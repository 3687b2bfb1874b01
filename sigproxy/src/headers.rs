// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};

use http::HeaderMap;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Headers is an ordered header map that preserves the casing it was given
/// while looking names up case-insensitively.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Headers(IndexMap<String, String>);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.keys().position(|k| k.eq_ignore_ascii_case(name))
    }

    /// Get the value of `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|idx| self.0.get_index(idx))
            .map(|(_, v)| v.as_str())
    }

    /// Check whether `name` is present, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Insert a header.
    ///
    /// If a header with the same name exists in any casing, its value is
    /// replaced in place and the existing casing is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => {
                if let Some((_, v)) = self.0.get_index_mut(idx) {
                    *v = value;
                }
            }
            None => {
                self.0.insert(name, value);
            }
        }
    }

    /// Append `value` to an existing header joined by `", "`, or insert it.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => {
                if let Some((_, v)) = self.0.get_index_mut(idx) {
                    v.push_str(", ");
                    v.push_str(&value);
                }
            }
            None => {
                self.0.insert(name, value);
            }
        }
    }

    /// Remove `name` ignoring case, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.position(name)?;
        self.0.shift_remove_index(idx).map(|(_, v)| v)
    }

    /// The casing this map uses for `name`, if present.
    pub fn key_of(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|idx| self.0.get_index(idx))
            .map(|(k, _)| k.as_str())
    }

    /// Lowercased names of all headers.
    pub fn lowercase_keys(&self) -> HashSet<String> {
        self.0.keys().map(|k| k.to_ascii_lowercase()).collect()
    }

    /// Iterate headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build headers from an [`HeaderMap`].
    ///
    /// Names found in `casing` take its casing, the rest are written in
    /// canonical form (`x-amz-date` becomes `X-Amz-Date`) unless `casing` is
    /// `None`, in which case the names are kept as given. Repeated values are
    /// joined by `", "`. Non UTF-8 bytes are replaced lossily.
    pub fn from_header_map(map: &HeaderMap, casing: Option<&Headers>) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            let name = match casing {
                Some(casing) => casing
                    .key_of(name.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| canonical_name(name.as_str())),
                None => name.as_str().to_string(),
            };
            headers.append(name, String::from_utf8_lossy(value.as_bytes()));
        }
        headers
    }

    /// Headers whose name is absent from `known`, a set of lowercased names.
    pub fn difference(&self, known: &HashSet<String>) -> Headers {
        Headers(
            self.0
                .iter()
                .filter(|(k, _)| !known.contains(&k.to_ascii_lowercase()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Debug for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl<'de> Deserialize<'de> for Headers {
    /// Names that differ only in case collapse into one entry, the last value wins.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = IndexMap::<String, String>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

/// Write a header name in canonical form: every `-` separated word starts
/// with an uppercase letter.
pub fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
