// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Local-Store backend: every option lives in one `name:value&name:value`
//! string under a single storage key.

use super::{BackendKind, OptionBackend};
use crate::codec::{WireEncoding, WireRecord, WireValue};
use crate::storage::{BlobStore, StoreError};
use tracing::debug;

/// Storage key holding the serialized option string.
pub const OPTIONS_KEY: &str = "options";

/// Parse a serialized option string.
///
/// Segments are split on `&`, then on the first `:` only. Segments without
/// a colon or with an empty name are skipped.
pub fn parse_record(serialized: &str) -> WireRecord {
    let mut record = WireRecord::new();
    for segment in serialized.split('&') {
        match segment.split_once(':') {
            Some((name, value)) if !name.is_empty() => {
                record.insert(name.to_owned(), WireValue::Text(value.to_owned()));
            }
            _ => {
                if !segment.is_empty() {
                    debug!(segment, "skipping malformed option segment");
                }
            }
        }
    }
    record
}

/// Serialize a record into the `name:value&…` form.
pub fn format_record(record: &WireRecord) -> String {
    record
        .iter()
        .map(|(name, value)| format!("{name}:{}", value.to_text()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Local-Store persistence over any [`BlobStore`].
pub struct LocalStore<S> {
    store: S,
    key: String,
}

impl<S> LocalStore<S> {
    /// Use the default [`OPTIONS_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, OPTIONS_KEY)
    }

    /// Use a custom storage key.
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Storage key in use.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<S: BlobStore> LocalStore<S> {
    fn read_serialized(&self) -> Result<Option<String>, StoreError> {
        match self.store.load_raw(&self.key) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl<S: BlobStore> OptionBackend for LocalStore<S> {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalStore
    }

    fn encoding(&self) -> WireEncoding {
        WireEncoding::Escaped
    }

    fn get_all(&mut self) -> Result<WireRecord, StoreError> {
        Ok(self
            .read_serialized()?
            .map(|serialized| parse_record(&serialized))
            .unwrap_or_default())
    }

    fn get_one(&mut self, name: &str) -> Result<Option<WireValue>, StoreError> {
        Ok(self.get_all()?.remove(name))
    }

    fn save_all(&mut self, record: WireRecord) -> Result<(), StoreError> {
        self.store
            .save_raw(&self.key, format_record(&record).as_bytes())
    }
}
