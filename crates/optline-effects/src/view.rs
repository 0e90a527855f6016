// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layout handlers: `initial_scale`, `chatview_name`, `msg_type`, `opt_revolve`.

use crate::ports::{ChatView, DocumentHost};
use optline_core::codec::{as_number, is_truthy};
use optline_core::{Effect, EffectCx, EffectKey, OptionValue};
use tracing::debug;

/// Scale used when the stored one is missing or out of range.
pub const DEFAULT_SCALE: f64 = 0.85;

/// Element that receives the revolve class.
pub const REVOLVE_ELEMENT: &str = "base-app";

/// Class toggled by `opt_revolve`.
pub const REVOLVE_CLASS: &str = "no-touch";

/// Viewport meta content for `scale`, substituting [`DEFAULT_SCALE`] when
/// it falls outside `0.5..=1.5`.
pub fn viewport_content(scale: Option<f64>) -> String {
    let scale = scale
        .filter(|s| (0.5..=1.5).contains(s))
        .unwrap_or(DEFAULT_SCALE);
    format!("width=device-width, initial-scale={scale}, maximum-scale=5, user-scalable=0")
}

/// Handler for [`EffectKey::InitialScale`].
pub struct InitialScale<D> {
    document: D,
}

impl<D> InitialScale<D> {
    /// Create the handler.
    pub fn new(document: D) -> Self {
        Self { document }
    }
}

impl<D: DocumentHost> Effect for InitialScale<D> {
    fn key(&self) -> EffectKey {
        EffectKey::InitialScale
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        self.document.set_viewport(&viewport_content(as_number(value)));
    }
}

/// Handler for [`EffectKey::ChatviewName`].
pub struct ChatViewSelect<D> {
    document: D,
}

impl<D> ChatViewSelect<D> {
    /// Create the handler.
    pub fn new(document: D) -> Self {
        Self { document }
    }
}

impl<D: DocumentHost> Effect for ChatViewSelect<D> {
    fn key(&self) -> EffectKey {
        EffectKey::ChatviewName
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        let view = match value.as_str() {
            Some(name) if !name.is_empty() => ChatView::Named(name.to_owned()),
            _ => ChatView::Default,
        };
        self.document.set_chat_view(view);
    }
}

/// Handler for [`EffectKey::MsgType`].
pub struct MsgType<D> {
    document: D,
}

impl<D> MsgType<D> {
    /// Create the handler.
    pub fn new(document: D) -> Self {
        Self { document }
    }
}

impl<D: DocumentHost> Effect for MsgType<D> {
    fn key(&self) -> EffectKey {
        EffectKey::MsgType
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        if !is_truthy(value) {
            return;
        }
        match as_number(value) {
            Some(tag) => self.document.set_msg_type(tag),
            None => debug!(%value, "msg_type is not numeric; skipping"),
        }
    }
}

/// Handler for [`EffectKey::OptRevolve`].
///
/// Truthy ensures the class is present, falsy ensures it is absent; the
/// statistics event fires only when the class is newly added.
pub struct Revolve<D> {
    document: D,
}

impl<D> Revolve<D> {
    /// Create the handler.
    pub fn new(document: D) -> Self {
        Self { document }
    }
}

impl<D: DocumentHost> Effect for Revolve<D> {
    fn key(&self) -> EffectKey {
        EffectKey::OptRevolve
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        let Some(present) = self.document.has_class(REVOLVE_ELEMENT, REVOLVE_CLASS) else {
            return;
        };
        let wanted = is_truthy(value);
        if wanted == present {
            return;
        }
        self.document.set_class(REVOLVE_ELEMENT, REVOLVE_CLASS, wanted);
        if wanted {
            self.document
                .record_event("click_statistics", "touch_randomly");
        }
    }
}
