// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence backends. Exactly one is handed to the pipeline at startup
//! and stays in place for the life of the process.
//!
//! None of the operations are transactional across keys; `save_all` always
//! replaces the whole persisted record.

mod bridge;
mod local;

pub use bridge::{BridgeReply, BridgeRequest, HostBridge, HostBridgeBackend};
pub use local::{format_record, parse_record, LocalStore, OPTIONS_KEY};

use crate::codec::{WireEncoding, WireRecord, WireValue};
use crate::storage::StoreError;

/// Which persistence variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// External host process reached by message exchange.
    HostBridge,
    /// Single serialized string in local key/value storage.
    LocalStore,
}

impl BackendKind {
    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            BackendKind::HostBridge => "host-bridge",
            BackendKind::LocalStore => "local-store",
        }
    }
}

/// Capability set shared by both persistence variants.
pub trait OptionBackend {
    /// Variant tag.
    fn kind(&self) -> BackendKind;
    /// How values must be encoded before `save_all`.
    fn encoding(&self) -> WireEncoding;
    /// Read the full persisted record.
    fn get_all(&mut self) -> Result<WireRecord, StoreError>;
    /// Read one persisted value without decoding it.
    fn get_one(&mut self, name: &str) -> Result<Option<WireValue>, StoreError>;
    /// Replace the persisted record.
    fn save_all(&mut self, record: WireRecord) -> Result<(), StoreError>;
}

impl<T: OptionBackend + ?Sized> OptionBackend for Box<T> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn encoding(&self) -> WireEncoding {
        (**self).encoding()
    }

    fn get_all(&mut self) -> Result<WireRecord, StoreError> {
        (**self).get_all()
    }

    fn get_one(&mut self, name: &str) -> Result<Option<WireValue>, StoreError> {
        (**self).get_one(name)
    }

    fn save_all(&mut self, record: WireRecord) -> Result<(), StoreError> {
        (**self).save_all(record)
    }
}
