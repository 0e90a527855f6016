// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-Bridge backend: options are owned by an external host process.

use super::{BackendKind, OptionBackend};
use crate::codec::{WireEncoding, WireRecord, WireValue};
use crate::storage::StoreError;

/// Requests the pipeline can make of a host.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeRequest {
    /// Fetch the full record.
    GetAll,
    /// Fetch a single wire value.
    Get {
        /// Option name.
        name: String,
    },
    /// Replace the host's record.
    SaveAll(WireRecord),
}

/// Replies a host sends back for round-trip requests.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeReply {
    /// Answer to [`BridgeRequest::GetAll`].
    All(WireRecord),
    /// Answer to [`BridgeRequest::Get`].
    One(Option<WireValue>),
}

/// Transport-agnostic message exchange with a host process.
pub trait HostBridge {
    /// Send a request and block until the matching reply arrives.
    fn request(&mut self, request: BridgeRequest) -> Result<BridgeReply, StoreError>;
    /// Send a request without waiting for any acknowledgment.
    fn post(&mut self, request: BridgeRequest) -> Result<(), StoreError>;
}

/// [`OptionBackend`] that delegates to a [`HostBridge`].
pub struct HostBridgeBackend<B> {
    bridge: B,
}

impl<B> HostBridgeBackend<B> {
    /// Wrap a bridge.
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }

    /// Borrow the bridge.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

fn unexpected(reply: &BridgeReply) -> StoreError {
    StoreError::Bridge(format!("unexpected reply: {reply:?}"))
}

impl<B: HostBridge> OptionBackend for HostBridgeBackend<B> {
    fn kind(&self) -> BackendKind {
        BackendKind::HostBridge
    }

    fn encoding(&self) -> WireEncoding {
        WireEncoding::Native
    }

    fn get_all(&mut self) -> Result<WireRecord, StoreError> {
        match self.bridge.request(BridgeRequest::GetAll)? {
            BridgeReply::All(record) => Ok(record),
            other => Err(unexpected(&other)),
        }
    }

    fn get_one(&mut self, name: &str) -> Result<Option<WireValue>, StoreError> {
        match self.bridge.request(BridgeRequest::Get {
            name: name.to_owned(),
        })? {
            BridgeReply::One(value) => Ok(value),
            other => Err(unexpected(&other)),
        }
    }

    fn save_all(&mut self, record: WireRecord) -> Result<(), StoreError> {
        self.bridge.post(BridgeRequest::SaveAll(record))
    }
}
