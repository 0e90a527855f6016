// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-Bridge wire schema: the messages exchanged between an options
//! client and the host process that owns the option record, carried in
//! checksummed CBOR envelopes (see [`wire`]).

use optline_core::{BridgeReply, BridgeRequest, StoreError, WireRecord, WireValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod wire;

/// Default Unix socket path for the options host.
///
/// Prefers the per-user runtime dir (XDG_RUNTIME_DIR) and falls back to `/tmp`.
pub fn default_socket_path() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join("optline-host.sock")
}

/// Envelope carried as the payload of every packet.
///
/// * `op` – operation name.
/// * `seq` – client-chosen sequence number; replies echo it.
/// * `payload` – operation specific body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEnvelope<P> {
    /// Operation name (e.g. "opt_get_all", "opt_all", "error").
    pub op: String,
    /// Sequence number used to pair replies with requests.
    pub seq: u64,
    /// Operation-specific body.
    pub payload: P,
}

/// Body of `opt_get`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPayload {
    /// Option name.
    pub name: String,
}

/// Body of `opt_all` and `opt_save_all`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordPayload {
    /// Full option record.
    pub record: WireRecord,
}

/// Body of `opt_one`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnePayload {
    /// Stored value, if any.
    pub value: Option<WireValue>,
}

/// Body of `win_always_top`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlwaysTopPayload {
    /// Keep the window above others.
    pub on_top: bool,
}

/// Body of `win_color_changed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinColorPayload {
    /// CSS color string.
    pub color: String,
}

/// Body of `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Numeric error code.
    pub code: u32,
    /// Stable identifier (e.g. "E_UNEXPECTED_OP").
    pub name: String,
    /// Human readable message.
    pub message: String,
}

/// Messages carried inside envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Ask for the full record (op = "opt_get_all").
    GetAll,
    /// Ask for one stored value (op = "opt_get").
    Get {
        /// Option name.
        name: String,
    },
    /// Full record reply (op = "opt_all").
    All(WireRecord),
    /// Single value reply (op = "opt_one").
    One(Option<WireValue>),
    /// Replace the record; never answered (op = "opt_save_all").
    SaveAll(WireRecord),
    /// Window always-on-top flag (op = "win_always_top").
    AlwaysTop {
        /// Keep the window above others.
        on_top: bool,
    },
    /// Ask for the current window color (op = "win_get_color").
    GetWinColor,
    /// Window color report, broadcast by the host (op = "win_color_changed").
    WinColorChanged {
        /// CSS color string.
        color: String,
    },
    /// Protocol or processing error (op = "error").
    Error(ErrorPayload),
}

impl Message {
    /// Canonical op string for this message variant.
    pub fn op_name(&self) -> &'static str {
        match self {
            Message::GetAll => "opt_get_all",
            Message::Get { .. } => "opt_get",
            Message::All(_) => "opt_all",
            Message::One(_) => "opt_one",
            Message::SaveAll(_) => "opt_save_all",
            Message::AlwaysTop { .. } => "win_always_top",
            Message::GetWinColor => "win_get_color",
            Message::WinColorChanged { .. } => "win_color_changed",
            Message::Error(_) => "error",
        }
    }
}

impl From<BridgeRequest> for Message {
    fn from(request: BridgeRequest) -> Self {
        match request {
            BridgeRequest::GetAll => Message::GetAll,
            BridgeRequest::Get { name } => Message::Get { name },
            BridgeRequest::SaveAll(record) => Message::SaveAll(record),
        }
    }
}

impl TryFrom<Message> for BridgeReply {
    type Error = StoreError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        match message {
            Message::All(record) => Ok(BridgeReply::All(record)),
            Message::One(value) => Ok(BridgeReply::One(value)),
            Message::Error(err) => Err(StoreError::Bridge(format!(
                "{} ({}): {}",
                err.name, err.code, err.message
            ))),
            other => Err(StoreError::Bridge(format!(
                "unexpected reply op {}",
                other.op_name()
            ))),
        }
    }
}
