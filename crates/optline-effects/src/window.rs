// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host window handlers: `opt_auto_win_color` and `opt_always_top`.
//! Both are no-ops when the application runs without a window host.

use crate::ports::{StyleHost, WindowHost};
use optline_core::codec::is_truthy;
use optline_core::{Effect, EffectCx, EffectKey, OptionValue};
use std::sync::mpsc::Receiver;
use tracing::debug;

/// Handler for [`EffectKey::OptAutoWinColor`].
pub struct AutoWindowColor<W, S> {
    window: Option<W>,
    style: S,
    colors: Option<Receiver<String>>,
}

impl<W, S> AutoWindowColor<W, S> {
    /// Create the handler.
    pub fn new(window: Option<W>, style: S) -> Self {
        Self {
            window,
            style,
            colors: None,
        }
    }

    /// Whether the window-color subscription has been installed.
    pub fn is_subscribed(&self) -> bool {
        self.colors.is_some()
    }
}

impl<W: WindowHost, S: StyleHost> Effect for AutoWindowColor<W, S> {
    fn key(&self) -> EffectKey {
        EffectKey::OptAutoWinColor
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        if !is_truthy(value) {
            return;
        }
        let Some(window) = &self.window else {
            return;
        };
        if self.colors.is_none() {
            self.colors = Some(window.subscribe_window_color());
        }
        window.request_window_color();
    }

    fn poll(&mut self, cx: &mut EffectCx<'_>) {
        let Some(colors) = &self.colors else {
            return;
        };
        for color in colors.try_iter() {
            if cx.is_truthy(EffectKey::OptAutoWinColor.name()) {
                debug!(%color, "window color changed");
                self.style.apply_window_color(&color);
            }
        }
    }
}

/// Handler for [`EffectKey::OptAlwaysTop`].
pub struct AlwaysOnTop<W> {
    window: Option<W>,
}

impl<W> AlwaysOnTop<W> {
    /// Create the handler.
    pub fn new(window: Option<W>) -> Self {
        Self { window }
    }
}

impl<W: WindowHost> Effect for AlwaysOnTop<W> {
    fn key(&self) -> EffectKey {
        EffectKey::OptAlwaysTop
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        if let Some(window) = &self.window {
            window.set_always_on_top(is_truthy(value));
        }
    }
}
