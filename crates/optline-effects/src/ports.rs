// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ports the handlers drive. Implementations are best-effort and handle
//! their own interior mutability; a missing element is a silent no-op.

use serde_json::Value;
use std::sync::mpsc::Receiver;

/// Locale message map as loaded from a bundle.
pub type LocaleMessages = Value;

/// Which chat view component is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatView {
    /// The stock chat view.
    Default,
    /// A named alternate view.
    Named(String),
}

/// Localization: bundle loading and active/fallback locale.
pub trait LocaleHost {
    /// Load the message bundle for `name`; `None` when unreachable.
    fn load_bundle(&self, name: &str) -> Option<LocaleMessages>;
    /// Register a loaded bundle under `name`.
    fn install_bundle(&self, name: &str, messages: LocaleMessages);
    /// Make `name` the active locale.
    fn set_locale(&self, name: &str);
    /// Make `name` the fallback locale.
    fn set_fallback_locale(&self, name: &str);
    /// Language code the platform actually resolved to.
    fn true_language(&self) -> String;
}

/// Stylesheets, root style properties and theme metadata.
pub trait StyleHost {
    /// Hrefs of every linked stylesheet, in document order.
    fn stylesheet_hrefs(&self) -> Vec<String>;
    /// Whether `href` can be fetched.
    fn probe(&self, href: &str) -> bool;
    /// Swap the stylesheet at `index` for `href`.
    fn replace_stylesheet(&self, index: usize, href: &str);
    /// Turn on the animated color transition.
    fn enable_color_transition(&self);
    /// Set a custom property on the document root.
    fn set_root_property(&self, name: &str, value: &str);
    /// Computed value of a root custom property.
    fn computed_property(&self, name: &str) -> Option<String>;
    /// Update the theme-color meta element.
    fn set_theme_color_meta(&self, color: &str);
    /// Apply a color reported by the host window.
    fn apply_window_color(&self, color: &str);
}

/// Document elements and application tags.
pub trait DocumentHost {
    /// Set the document language attribute.
    fn set_lang_attribute(&self, lang: &str);
    /// Set the viewport meta content.
    fn set_viewport(&self, content: &str);
    /// Show or hide a settings control by id.
    fn set_control_visible(&self, id: &str, visible: bool);
    /// Whether `element` carries `class`; `None` when the element is missing.
    fn has_class(&self, element: &str, class: &str) -> Option<bool>;
    /// Add or remove `class` on `element`.
    fn set_class(&self, element: &str, class: &str, present: bool);
    /// Switch the chat view component.
    fn set_chat_view(&self, view: ChatView);
    /// Set the numeric message-type tag.
    fn set_msg_type(&self, tag: f64);
    /// Record whether dark mode is active.
    fn set_dark_mode(&self, dark: bool);
    /// Send a statistics event.
    fn record_event(&self, category: &str, name: &str);
}

/// Environment color-scheme preference.
pub trait ColorScheme {
    /// Whether the environment currently prefers dark.
    fn prefers_dark(&self) -> bool;
    /// Stream of preference changes.
    fn subscribe(&self) -> Receiver<bool>;
}

/// Native host window controls.
pub trait WindowHost {
    /// Keep the window above others.
    fn set_always_on_top(&self, on_top: bool);
    /// Stream of window color changes.
    fn subscribe_window_color(&self) -> Receiver<String>;
    /// Ask the host to report its current window color.
    fn request_window_color(&self);
}
