// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-Bridge fake that answers from an in-memory record.

use optline_core::{BridgeReply, BridgeRequest, HostBridge, StoreError, WireRecord, WireValue};
use std::sync::{Arc, Mutex, MutexGuard};

/// [`HostBridge`] backed by a shared [`WireRecord`].
///
/// Posted saves replace the record, like a real host does.
#[derive(Clone, Default)]
pub struct LoopbackBridge {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    record: WireRecord,
    requests: Vec<BridgeRequest>,
    posts: Vec<WireRecord>,
    offline: bool,
}

impl LoopbackBridge {
    /// Bridge with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge seeded with `entries`.
    pub fn with_record<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, WireValue)>,
        K: Into<String>,
    {
        let bridge = Self::new();
        bridge.lock().record = entries
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        bridge
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail every request and post with a bridge error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// The host's current record.
    pub fn record(&self) -> WireRecord {
        self.lock().record.clone()
    }

    /// Round-trip requests received, oldest first.
    pub fn requests(&self) -> Vec<BridgeRequest> {
        self.lock().requests.clone()
    }

    /// Records posted through `SaveAll`, oldest first.
    pub fn posts(&self) -> Vec<WireRecord> {
        self.lock().posts.clone()
    }
}

impl HostBridge for LoopbackBridge {
    fn request(&mut self, request: BridgeRequest) -> Result<BridgeReply, StoreError> {
        let mut inner = self.lock();
        inner.requests.push(request.clone());
        if inner.offline {
            return Err(StoreError::Bridge("host offline".into()));
        }
        match request {
            BridgeRequest::GetAll => Ok(BridgeReply::All(inner.record.clone())),
            BridgeRequest::Get { name } => Ok(BridgeReply::One(inner.record.get(&name).cloned())),
            BridgeRequest::SaveAll(_) => Err(StoreError::Bridge(
                "save_all is posted, not requested".into(),
            )),
        }
    }

    fn post(&mut self, request: BridgeRequest) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(StoreError::Bridge("host offline".into()));
        }
        if let BridgeRequest::SaveAll(record) = request {
            inner.posts.push(record.clone());
            inner.record = record;
        }
        Ok(())
    }
}
