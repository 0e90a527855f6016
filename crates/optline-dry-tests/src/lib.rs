// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles for optline crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`storage`] - in-memory blob store with counters and failure toggles
//! - [`bridge`] - loopback Host-Bridge answering from an in-memory record
//! - [`surface`] - recording fake for every effect port

pub mod bridge;
pub mod storage;
pub mod surface;

pub use bridge::LoopbackBridge;
pub use storage::InMemoryBlobStore;
pub use surface::{RecordingSurface, SurfaceState};
