// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory option snapshot, authoritative for reads once loaded.
//!
//! `get` cannot tell a stored `null` from an absent name: both read as
//! `None`. Callers treat `None` as "use the implicit default".

use crate::codec::{is_truthy, OptionMap, OptionValue};
use serde_json::Value;

/// Option cache. Uninitialized until the first [`OptionCache::install`].
#[derive(Debug, Clone, Default)]
pub struct OptionCache {
    entries: Option<OptionMap>,
}

impl OptionCache {
    /// Empty, uninitialized cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot.
    pub fn install(&mut self, entries: OptionMap) {
        self.entries = Some(entries);
    }

    /// Whether a snapshot has been installed.
    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    /// Logical value for `name`; string values are re-parsed as JSON.
    ///
    /// Returns `None` when uninitialized, absent, or stored as `null`.
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        match self.raw(name)? {
            Value::Null => None,
            Value::String(text) => {
                Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())))
            }
            other => Some(other.clone()),
        }
    }

    /// Cached value exactly as stored.
    pub fn raw(&self, name: &str) -> Option<&OptionValue> {
        self.entries.as_ref()?.get(name)
    }

    /// Truthiness of `get(name)`; absent names are falsy.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).as_ref().is_some_and(is_truthy)
    }

    /// Store a value, initializing the snapshot if needed.
    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        self.entries_mut().insert(name.into(), value);
    }

    /// Drop a name from the snapshot.
    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.entries.as_mut()?.remove(name)
    }

    /// Mutable snapshot, installing an empty one if needed.
    pub fn entries_mut(&mut self) -> &mut OptionMap {
        self.entries.get_or_insert_with(OptionMap::new)
    }

    /// Borrow the snapshot, if installed.
    pub fn entries(&self) -> Option<&OptionMap> {
        self.entries.as_ref()
    }

    /// Owned copy of the snapshot (empty when uninitialized).
    pub fn snapshot(&self) -> OptionMap {
        self.entries.clone().unwrap_or_default()
    }

    /// Number of cached names.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, OptionMap::len)
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
