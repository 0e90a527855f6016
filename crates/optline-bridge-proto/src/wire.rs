// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Packet framing and CBOR helpers.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is a CBOR [`OpEnvelope`]
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use ciborium::value::Value;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    AlwaysTopPayload, ErrorPayload, GetPayload, Message, OnePayload, OpEnvelope, RecordPayload,
    WinColorPayload,
};

/// Protocol magic constant "OPT!".
pub const MAGIC: [u8; 4] = *b"OPT!";
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (zero in v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_LEN: usize = 12;
/// Trailing checksum length in bytes.
pub const CHECKSUM_LEN: usize = 32;
/// Largest payload either side accepts.
pub const MAX_PAYLOAD: usize = 8 * 1024 * 1024;

/// Framing and encoding failures.
#[derive(Debug, Error)]
pub enum WireError {
    /// Not enough bytes for a whole packet yet.
    #[error("incomplete packet")]
    Incomplete,
    /// Header does not start with [`MAGIC`].
    #[error("bad magic")]
    BadMagic,
    /// Header carries a version this build does not speak.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// Declared payload exceeds [`MAX_PAYLOAD`].
    #[error("payload of {0} bytes exceeds limit")]
    PayloadTooLarge(usize),
    /// Checksum does not match header and payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// Envelope names an op this build does not know.
    #[error("unknown op {0}")]
    UnknownOp(String),
    /// CBOR encoding or decoding failed.
    #[error("cbor: {0}")]
    Cbor(String),
}

/// Encode to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WireError::Cbor(e.to_string()))?;
    Ok(out)
}

/// Decode from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Cbor(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, WireError> {
    Value::serialized(value).map_err(|e| WireError::Cbor(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, WireError> {
    value
        .deserialized()
        .map_err(|e| WireError::Cbor(e.to_string()))
}

/// A full packet (header + payload + checksum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw header.
    pub header: [u8; HEADER_LEN],
    /// CBOR payload bytes.
    pub payload: Vec<u8>,
    /// blake3 checksum over header||payload.
    pub checksum: [u8; CHECKSUM_LEN],
}

fn checksum(header: &[u8], payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

impl Packet {
    /// Build a packet around a CBOR payload.
    pub fn from_payload(payload: Vec<u8>) -> Result<Self, WireError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(WireError::PayloadTooLarge(payload.len()));
        }
        let len = u32::try_from(payload.len()).map_err(|_| WireError::PayloadTooLarge(payload.len()))?;
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_be_bytes());
        header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
        header[8..12].copy_from_slice(&len.to_be_bytes());
        let checksum = checksum(&header, &payload);
        Ok(Packet {
            header,
            payload,
            checksum,
        })
    }

    /// Concatenate the packet into wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + CHECKSUM_LEN);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum);
        out
    }

    /// Encode an envelope into packet bytes.
    pub fn encode_envelope<P: Serialize>(env: &OpEnvelope<P>) -> Result<Vec<u8>, WireError> {
        Ok(Packet::from_payload(to_cbor(env)?)?.into_bytes())
    }

    /// Decode a packet from the front of `bytes`, returning the envelope and
    /// bytes consumed.
    pub fn decode_envelope<P: DeserializeOwned>(
        bytes: &[u8],
    ) -> Result<(OpEnvelope<P>, usize), WireError> {
        let total = frame_len(bytes)?.ok_or(WireError::Incomplete)?;
        if bytes.len() < total {
            return Err(WireError::Incomplete);
        }
        let header = &bytes[..HEADER_LEN];
        let payload = &bytes[HEADER_LEN..total - CHECKSUM_LEN];
        if checksum(header, payload) != bytes[total - CHECKSUM_LEN..total] {
            return Err(WireError::ChecksumMismatch);
        }
        Ok((from_cbor(payload)?, total))
    }
}

/// Total packet length announced by the header at the front of `bytes`.
///
/// `Ok(None)` until a whole header is buffered. Fails on a bad magic,
/// an unknown version or an oversized payload, so a stream reader can drop
/// the connection before buffering garbage.
pub fn frame_len(bytes: &[u8]) -> Result<Option<usize>, WireError> {
    if bytes.len() < HEADER_LEN {
        return Ok(None);
    }
    if bytes[0..4] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if len > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge(len));
    }
    Ok(Some(HEADER_LEN + len + CHECKSUM_LEN))
}

/// Encode a [`Message`] into a packet with the given sequence number.
pub fn encode_message(msg: &Message, seq: u64) -> Result<Vec<u8>, WireError> {
    let payload = match msg {
        Message::GetAll | Message::GetWinColor => Value::Null,
        Message::Get { name } => to_value(&GetPayload { name: name.clone() })?,
        Message::All(record) | Message::SaveAll(record) => to_value(&RecordPayload {
            record: record.clone(),
        })?,
        Message::One(value) => to_value(&OnePayload {
            value: value.clone(),
        })?,
        Message::AlwaysTop { on_top } => to_value(&AlwaysTopPayload { on_top: *on_top })?,
        Message::WinColorChanged { color } => to_value(&WinColorPayload {
            color: color.clone(),
        })?,
        Message::Error(err) => to_value(err)?,
    };
    Packet::encode_envelope(&OpEnvelope {
        op: msg.op_name().to_owned(),
        seq,
        payload,
    })
}

/// Decode bytes into `(Message, seq, bytes_consumed)`.
pub fn decode_message(bytes: &[u8]) -> Result<(Message, u64, usize), WireError> {
    let (env, used) = Packet::decode_envelope::<Value>(bytes)?;
    let payload = &env.payload;
    let msg = match env.op.as_str() {
        "opt_get_all" => Message::GetAll,
        "opt_get" => {
            let p: GetPayload = from_value(payload)?;
            Message::Get { name: p.name }
        }
        "opt_all" => Message::All(from_value::<RecordPayload>(payload)?.record),
        "opt_one" => Message::One(from_value::<OnePayload>(payload)?.value),
        "opt_save_all" => Message::SaveAll(from_value::<RecordPayload>(payload)?.record),
        "win_always_top" => {
            let p: AlwaysTopPayload = from_value(payload)?;
            Message::AlwaysTop { on_top: p.on_top }
        }
        "win_get_color" => Message::GetWinColor,
        "win_color_changed" => {
            let p: WinColorPayload = from_value(payload)?;
            Message::WinColorChanged { color: p.color }
        }
        "error" => Message::Error(from_value::<ErrorPayload>(payload)?),
        other => return Err(WireError::UnknownOp(other.to_owned())),
    };
    Ok((msg, env.seq, used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optline_core::{WireRecord, WireValue};
    use serde_json::json;

    fn sample_record() -> WireRecord {
        let mut record = WireRecord::new();
        record.insert("opt_dark".into(), WireValue::Native(json!(true)));
        record.insert("initial_scale".into(), WireValue::Native(json!(0.9)));
        record.insert("store_face".into(), WireValue::Text("[1,2]".into()));
        record
    }

    #[test]
    fn header_layout_and_checksum() {
        let bytes = encode_message(&Message::GetAll, 7).unwrap();
        assert_eq!(&bytes[0..4], b"OPT!");
        assert_eq!(&bytes[4..6], &[0, 1]);
        assert_eq!(&bytes[6..8], &[0, 0]);
        let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert_eq!(bytes.len(), HEADER_LEN + len + CHECKSUM_LEN);
        assert_eq!(frame_len(&bytes).unwrap(), Some(bytes.len()));
    }

    #[test]
    fn record_survives_framing_and_seq_is_kept() {
        let bytes = encode_message(&Message::All(sample_record()), 42).unwrap();
        let (msg, seq, used) = decode_message(&bytes).unwrap();
        assert_eq!(seq, 42);
        assert_eq!(used, bytes.len());
        assert_eq!(msg, Message::All(sample_record()));
    }

    #[test]
    fn decode_consumes_only_the_first_packet() {
        let mut stream = encode_message(&Message::Get { name: "language".into() }, 1).unwrap();
        let first = stream.len();
        stream.extend(encode_message(&Message::GetWinColor, 2).unwrap());
        let (msg, seq, used) = decode_message(&stream).unwrap();
        assert_eq!(msg, Message::Get { name: "language".into() });
        assert_eq!((seq, used), (1, first));
        let (msg, seq, _) = decode_message(&stream[used..]).unwrap();
        assert_eq!((msg, seq), (Message::GetWinColor, 2));
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let mut bytes = encode_message(&Message::AlwaysTop { on_top: true }, 3).unwrap();
        bytes[HEADER_LEN] ^= 0xff;
        assert!(matches!(decode_message(&bytes), Err(WireError::ChecksumMismatch)));
    }

    #[test]
    fn short_or_foreign_input_is_rejected() {
        let bytes = encode_message(&Message::GetAll, 0).unwrap();
        assert_eq!(frame_len(&bytes[..5]).unwrap(), None);
        assert!(matches!(
            decode_message(&bytes[..bytes.len() - 1]),
            Err(WireError::Incomplete)
        ));

        let mut foreign = bytes.clone();
        foreign[0] = b'X';
        assert!(matches!(frame_len(&foreign), Err(WireError::BadMagic)));

        let mut huge = bytes;
        huge[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(frame_len(&huge), Err(WireError::PayloadTooLarge(_))));
    }

    #[test]
    fn unknown_ops_are_reported() {
        let bytes = Packet::encode_envelope(&OpEnvelope {
            op: "opt_frobnicate".to_owned(),
            seq: 0,
            payload: Value::Null,
        })
        .unwrap();
        assert!(matches!(decode_message(&bytes), Err(WireError::UnknownOp(op)) if op == "opt_frobnicate"));
    }
}
