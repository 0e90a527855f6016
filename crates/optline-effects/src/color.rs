// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Color handlers: `opt_dark`, `opt_auto_dark` and `theme_color`.

use crate::ports::{ColorScheme, DocumentHost, StyleHost};
use optline_core::codec::is_truthy;
use optline_core::{Effect, EffectCx, EffectKey, NoticeKind, OptionValue};
use regex::RegexSet;
use serde_json::Value;
use std::sync::mpsc::Receiver;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Stylesheet families that come in light and dark variants.
const THEMED_PATTERNS: [&str; 3] = ["color-.*.css", "prism-.*.css", "append-.*.css"];

static THEMED_SHEETS: LazyLock<Option<RegexSet>> = LazyLock::new(|| {
    RegexSet::new(THEMED_PATTERNS)
        .map_err(|err| warn!(%err, "themed stylesheet patterns rejected"))
        .ok()
});

/// Settings control hidden while the mode follows the environment.
pub const DARK_TOGGLE_CONTROL: &str = "opt_view_dark";

/// Color mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Light stylesheets.
    Light,
    /// Dark stylesheets.
    Dark,
}

impl ColorMode {
    /// Mode selected by an option value.
    pub fn from_value(value: &OptionValue) -> Self {
        if is_truthy(value) {
            Self::Dark
        } else {
            Self::Light
        }
    }

    /// Token used in stylesheet hrefs.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    const fn opposite(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Whether `href` belongs to one of the themed stylesheet families.
pub fn is_themed_stylesheet(href: &str) -> bool {
    THEMED_SHEETS
        .as_ref()
        .is_some_and(|sheets| sheets.is_match(href))
}

/// Href of the `mode` variant of `href`, or `None` when it already is one.
pub fn retarget(href: &str, mode: ColorMode) -> Option<String> {
    let from = mode.opposite().token();
    href.contains(from)
        .then(|| href.replacen(from, mode.token(), 1))
}

/// Handler for [`EffectKey::OptDark`].
pub struct DarkMode<S, D> {
    style: S,
    document: D,
    applied_once: bool,
}

impl<S, D> DarkMode<S, D> {
    /// Create the handler.
    pub fn new(style: S, document: D) -> Self {
        Self {
            style,
            document,
            applied_once: false,
        }
    }
}

impl<S: StyleHost, D: DocumentHost> Effect for DarkMode<S, D> {
    fn key(&self) -> EffectKey {
        EffectKey::OptDark
    }

    fn apply(&mut self, value: &OptionValue, cx: &mut EffectCx<'_>) {
        let mode = ColorMode::from_value(value);
        if self.applied_once {
            self.style.enable_color_transition();
        }
        self.applied_once = true;

        for (index, href) in self.style.stylesheet_hrefs().into_iter().enumerate() {
            if !is_themed_stylesheet(&href) {
                continue;
            }
            let Some(target) = retarget(&href, mode) else {
                continue;
            };
            if !self.style.probe(&target) {
                cx.notify(
                    NoticeKind::Error,
                    "Color mode could not be switched",
                    Some(format!("stylesheet `{target}` is unreachable")),
                );
                continue;
            }
            debug!(%href, %target, "swapping stylesheet");
            self.style.replace_stylesheet(index, &target);
        }

        if let Some(color) = self.style.computed_property("--color-main") {
            self.style.set_theme_color_meta(color.trim());
        }
        self.document.set_dark_mode(mode == ColorMode::Dark);
    }
}

/// Handler for [`EffectKey::OptAutoDark`].
///
/// Owns the color-scheme subscription once installed; changes are drained
/// in [`Effect::poll`].
pub struct AutoDark<C, D> {
    scheme: C,
    document: D,
    changes: Option<Receiver<bool>>,
}

impl<C, D> AutoDark<C, D> {
    /// Create the handler.
    pub fn new(scheme: C, document: D) -> Self {
        Self {
            scheme,
            document,
            changes: None,
        }
    }

    /// Whether the change subscription has been installed.
    pub fn is_subscribed(&self) -> bool {
        self.changes.is_some()
    }
}

impl<C: ColorScheme, D: DocumentHost> Effect for AutoDark<C, D> {
    fn key(&self) -> EffectKey {
        EffectKey::OptAutoDark
    }

    fn apply(&mut self, value: &OptionValue, cx: &mut EffectCx<'_>) {
        if is_truthy(value) {
            cx.run(
                EffectKey::OptDark.name(),
                Value::Bool(self.scheme.prefers_dark()),
            );
            if self.changes.is_none() {
                self.changes = Some(self.scheme.subscribe());
            }
            self.document.set_control_visible(DARK_TOGGLE_CONTROL, false);
        } else {
            self.document.set_control_visible(DARK_TOGGLE_CONTROL, true);
            cx.reapply(EffectKey::OptDark.name());
        }
    }

    fn poll(&mut self, cx: &mut EffectCx<'_>) {
        let Some(changes) = &self.changes else {
            return;
        };
        for prefers_dark in changes.try_iter() {
            if !cx.is_truthy(EffectKey::OptAutoDark.name()) {
                continue;
            }
            debug!(prefers_dark, "color scheme changed");
            cx.run(EffectKey::OptDark.name(), Value::Bool(prefers_dark));
            let win_color = cx
                .get(EffectKey::OptAutoWinColor.name())
                .unwrap_or(Value::Null);
            cx.run_and_save(EffectKey::OptAutoWinColor.name(), win_color);
        }
    }
}

/// Handler for [`EffectKey::ThemeColor`].
pub struct ThemeColor<S> {
    style: S,
}

impl<S> ThemeColor<S> {
    /// Create the handler.
    pub fn new(style: S) -> Self {
        Self { style }
    }
}

impl<S: StyleHost> Effect for ThemeColor<S> {
    fn key(&self) -> EffectKey {
        EffectKey::ThemeColor
    }

    fn apply(&mut self, value: &OptionValue, _cx: &mut EffectCx<'_>) {
        let id = match value {
            Value::Number(n) => n.to_string(),
            Value::String(text) => text.clone(),
            _ => return,
        };
        self.style
            .set_root_property("--color-main", &format!("var(--color-main-{id})"));
        if let Some(color) = self.style.computed_property(&format!("--color-main-{id}")) {
            self.style.set_theme_color_meta(color.trim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themed_stylesheets_are_recognized() {
        assert!(is_themed_stylesheet("/css/color-light.css"));
        assert!(is_themed_stylesheet("https://x/prism-dark.min.css"));
        assert!(is_themed_stylesheet("append-light.css"));
        assert!(!is_themed_stylesheet("/css/base.css"));
        assert!(!is_themed_stylesheet("color-css"));
        assert!(is_themed_stylesheet("/color-dark.scss"));
    }

    #[test]
    fn retarget_swaps_first_token_only() {
        assert_eq!(
            retarget("/light/color-light.css", ColorMode::Dark).as_deref(),
            Some("/dark/color-light.css")
        );
        assert_eq!(
            retarget("color-dark.css", ColorMode::Light).as_deref(),
            Some("color-light.css")
        );
        assert_eq!(retarget("color-dark.css", ColorMode::Dark), None);
    }

    #[test]
    fn truthy_values_select_dark() {
        assert_eq!(ColorMode::from_value(&Value::Bool(true)), ColorMode::Dark);
        assert_eq!(ColorMode::from_value(&Value::Null), ColorMode::Light);
    }
}
