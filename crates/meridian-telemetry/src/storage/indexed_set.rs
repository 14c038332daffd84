// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A set of shared entries kept under several lookup keys at once.

use meridian_core::telemetry::{MetricsError, MetricsResult};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A named key extractor describing one index of an [`IndexedSet`].
///
/// Definitions are plain values, usually declared as `const` next to the
/// container that uses them.
pub struct IndexDefinition<T> {
    name: &'static str,
    unique: bool,
    extractor: fn(&T) -> String,
}

impl<T> IndexDefinition<T> {
    /// An index under which at most one entry may live per key.
    pub const fn unique(name: &'static str, extractor: fn(&T) -> String) -> Self {
        Self {
            name,
            unique: true,
            extractor,
        }
    }

    /// An index under which many entries may share a key.
    pub const fn non_unique(name: &'static str, extractor: fn(&T) -> String) -> Self {
        Self {
            name,
            unique: false,
            extractor,
        }
    }

    /// The index name, used to resolve lookups.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether keys are unique under this index.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Extracts this index's key from an entry.
    pub fn key_of(&self, item: &T) -> String {
        (self.extractor)(item)
    }
}

impl<T> Clone for IndexDefinition<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for IndexDefinition<T> {}

impl<T> fmt::Debug for IndexDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .finish()
    }
}

/// Buckets of one secondary index: key -> (primary key -> entry).
type Buckets<T> = HashMap<String, BTreeMap<String, Arc<T>>>;

/// An unsynchronized container of `Arc<T>` entries indexed by a unique
/// primary key and any number of secondary keys.
///
/// Every index is updated inside the same call as the insertion or removal,
/// so an entry is either visible under all of its keys or under none. When a
/// new entry collides with an existing one on any unique index, the existing
/// entry is removed from every index first: the last writer wins.
///
/// Lookups return entries ordered by primary key.
#[derive(Debug)]
pub struct IndexedSet<T> {
    primary: IndexDefinition<T>,
    entries: BTreeMap<String, Arc<T>>,
    secondary: Vec<(IndexDefinition<T>, Buckets<T>)>,
}

impl<T> IndexedSet<T> {
    /// Creates an empty set. The primary index must be unique.
    pub fn new(primary: IndexDefinition<T>, secondary: &[IndexDefinition<T>]) -> Self {
        debug_assert!(primary.is_unique(), "primary index must be unique");
        Self {
            primary,
            entries: BTreeMap::new(),
            secondary: secondary.iter().map(|def| (*def, HashMap::new())).collect(),
        }
    }

    /// Inserts an entry, returning the entry it replaced under the primary key.
    pub fn add(&mut self, item: T) -> Option<Arc<T>> {
        let item = Arc::new(item);
        let primary_key = self.primary.key_of(&item);
        let replaced = self.remove_entry(&primary_key);

        let colliding: Vec<String> = self
            .secondary
            .iter()
            .filter(|(def, _)| def.is_unique())
            .filter_map(|(def, buckets)| buckets.get(&def.key_of(&item)))
            .flat_map(|bucket| bucket.keys().cloned())
            .collect();
        for key in colliding {
            self.remove_entry(&key);
        }

        for (def, buckets) in &mut self.secondary {
            buckets
                .entry(def.key_of(&item))
                .or_default()
                .insert(primary_key.clone(), Arc::clone(&item));
        }
        self.entries.insert(primary_key, item);
        replaced
    }

    /// Returns every entry stored under `key` in `index`.
    pub fn get_by_field(
        &self,
        index: &IndexDefinition<T>,
        key: &str,
    ) -> MetricsResult<Vec<Arc<T>>> {
        if index.name() == self.primary.name() {
            return Ok(self.entries.get(key).cloned().into_iter().collect());
        }
        let buckets = self.buckets(index)?;
        Ok(buckets
            .get(key)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns the first entry, by primary key, stored under `key` in `index`.
    pub fn get_first_by_field(
        &self,
        index: &IndexDefinition<T>,
        key: &str,
    ) -> MetricsResult<Option<Arc<T>>> {
        if index.name() == self.primary.name() {
            return Ok(self.entries.get(key).cloned());
        }
        let buckets = self.buckets(index)?;
        Ok(buckets
            .get(key)
            .and_then(|bucket| bucket.values().next().cloned()))
    }

    /// Whether any entry is stored under `key` in `index`.
    pub fn contains_field(&self, index: &IndexDefinition<T>, key: &str) -> MetricsResult<bool> {
        Ok(self.get_first_by_field(index, key)?.is_some())
    }

    /// Removes every entry stored under `key` in `index` and returns how many
    /// were removed.
    pub fn remove_by_field(
        &mut self,
        index: &IndexDefinition<T>,
        key: &str,
    ) -> MetricsResult<usize> {
        let primary_keys: Vec<String> = if index.name() == self.primary.name() {
            self.entries.contains_key(key).then(|| key.to_string()).into_iter().collect()
        } else {
            self.buckets(index)?
                .get(key)
                .map(|bucket| bucket.keys().cloned().collect())
                .unwrap_or_default()
        };

        let mut removed = 0;
        for primary_key in primary_keys {
            if self.remove_entry(&primary_key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// The number of distinct keys currently present in `index`.
    pub fn distinct_keys(&self, index: &IndexDefinition<T>) -> MetricsResult<usize> {
        if index.name() == self.primary.name() {
            return Ok(self.entries.len());
        }
        Ok(self.buckets(index)?.len())
    }

    /// Iterates every entry in primary-key order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.values()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry from every index.
    pub fn clear(&mut self) {
        self.entries.clear();
        for (_, buckets) in &mut self.secondary {
            buckets.clear();
        }
    }

    fn buckets(&self, index: &IndexDefinition<T>) -> MetricsResult<&Buckets<T>> {
        self.secondary
            .iter()
            .find(|(def, _)| def.name() == index.name())
            .map(|(_, buckets)| buckets)
            .ok_or_else(|| MetricsError::UnknownIndex(index.name().to_string()))
    }

    fn remove_entry(&mut self, primary_key: &str) -> Option<Arc<T>> {
        let item = self.entries.remove(primary_key)?;
        for (def, buckets) in &mut self.secondary {
            let key = def.key_of(&item);
            if let Some(bucket) = buckets.get_mut(&key) {
                bucket.remove(primary_key);
                if bucket.is_empty() {
                    buckets.remove(&key);
                }
            }
        }
        Some(item)
    }
}
