// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory blob store fake: the Local-Store medium without a filesystem.

use optline_core::backend::OPTIONS_KEY;
use optline_core::{BlobStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory [`BlobStore`] with call counters and failure toggles.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the backend owns another.
///
/// # Example
///
/// ```
/// use optline_core::{LocalStore, OptionBackend};
/// use optline_dry_tests::InMemoryBlobStore;
///
/// let store = InMemoryBlobStore::with_options("opt_dark:true");
/// let mut backend = LocalStore::new(store.clone());
/// assert_eq!(backend.get_all().unwrap().len(), 1);
/// assert_eq!(store.load_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    blobs: BTreeMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryBlobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a serialized option string under the options key.
    pub fn with_options(serialized: &str) -> Self {
        let store = Self::new();
        store
            .lock()
            .blobs
            .insert(OPTIONS_KEY.to_owned(), serialized.as_bytes().to_vec());
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every `load_raw` fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make every `save_raw` fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// `load_raw` attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// `save_raw` attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Blob under `key` as UTF-8 text.
    pub fn text(&self, key: &str) -> Option<String> {
        self.lock()
            .blobs
            .get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// The serialized option string, if one was written.
    pub fn options_text(&self) -> Option<String> {
        self.text(OPTIONS_KEY)
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(StoreError::Other("simulated load failure".into()));
        }
        inner.blobs.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(StoreError::Other("simulated save failure".into()));
        }
        inner.blobs.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}
