// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Option pipeline core: typed load/coerce/cache/apply/save over two
//! interchangeable persistence backends.
//!
//! The crate stays free of UI and transport details. Concrete effect
//! handlers live in `optline-effects`; the socket bridge lives in
//! `optline-bridge-client`.
//!
//! # Modules
//!
//! - [`codec`] - wire text ⇄ logical values
//! - [`storage`] - raw blob storage port and typed JSON blobs
//! - [`backend`] - Local-Store and Host-Bridge persistence variants
//! - [`cache`] - the in-memory option snapshot
//! - [`effect`] - effect trait, keys and registry
//! - [`notice`] - user-visible notices queued for the presentation layer
//! - [`defaults`] - the option default table
//! - [`pipeline`] - the [`OptionStore`] orchestrator
#![forbid(unsafe_code)]

pub mod backend;
pub mod cache;
pub mod codec;
pub mod defaults;
pub mod effect;
pub mod notice;
pub mod pipeline;
pub mod storage;

pub use backend::{
    BackendKind, BridgeReply, BridgeRequest, HostBridge, HostBridgeBackend, LocalStore,
    OptionBackend,
};
pub use cache::OptionCache;
pub use codec::{OptionMap, OptionValue, WireEncoding, WireRecord, WireValue};
pub use effect::{Effect, EffectCx, EffectKey, EffectRegistry, Followup};
pub use notice::{Notice, NoticeKind, NoticeQueue};
pub use pipeline::OptionStore;
pub use storage::{BlobStore, JsonBlobService, StoreError};
