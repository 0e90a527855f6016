// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blob storage port and the error type shared by every persistence path.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw blobs keyed by a fixed storage key (the Local-Store
/// medium, and the host's record file).
pub trait BlobStore {
    /// Load a raw blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    /// Persist a raw blob, replacing any previous content.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// Error type for storage and backend operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The host bridge failed or answered out of protocol.
    #[error("bridge error: {0}")]
    Bridge(String),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes typed values as JSON and delegates storage to a [`BlobStore`].
pub struct JsonBlobService<S> {
    store: S,
}

impl<S> JsonBlobService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the inner store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> JsonBlobService<S>
where
    S: BlobStore,
{
    /// Load and deserialize the value stored under `key`. Returns `Ok(None)` if missing or empty.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist `value` under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}
