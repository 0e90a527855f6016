// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording fake for every effect port.

use optline_effects::{ChatView, ColorScheme, DocumentHost, LocaleHost, StyleHost, WindowHost};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything a [`RecordingSurface`] has observed or been configured with.
#[derive(Debug, Clone, Default)]
pub struct SurfaceState {
    /// Bundles the locale host can load, by name.
    pub bundles: BTreeMap<String, Value>,
    /// Bundle names installed, in order.
    pub installed: Vec<String>,
    /// Active locale.
    pub locale: Option<String>,
    /// Fallback locale.
    pub fallback_locale: Option<String>,
    /// What `true_language` reports.
    pub true_language: String,
    /// Document `lang` attribute.
    pub lang_attribute: Option<String>,
    /// Linked stylesheet hrefs.
    pub stylesheets: Vec<String>,
    /// Hrefs that fail the reachability probe.
    pub unreachable: BTreeSet<String>,
    /// Hrefs probed, in order.
    pub probes: Vec<String>,
    /// Times the color transition was enabled.
    pub transitions: usize,
    /// Root custom properties set by handlers.
    pub root_properties: BTreeMap<String, String>,
    /// Computed root properties available to read.
    pub computed: BTreeMap<String, String>,
    /// Theme-color meta content.
    pub theme_meta: Option<String>,
    /// Last applied window color.
    pub window_color: Option<String>,
    /// Viewport meta content.
    pub viewport: Option<String>,
    /// Control visibility by id.
    pub controls: BTreeMap<String, bool>,
    /// Classes by element id; absent ids are missing elements.
    pub classes: BTreeMap<String, BTreeSet<String>>,
    /// Active chat view.
    pub chat_view: Option<ChatView>,
    /// Message-type tag.
    pub msg_type: Option<f64>,
    /// Recorded dark-mode flag.
    pub dark_mode: Option<bool>,
    /// Statistics events `(category, name)`.
    pub events: Vec<(String, String)>,
    /// Environment dark preference.
    pub prefers_dark: bool,
    /// Color-scheme subscriptions handed out.
    pub scheme_subscriptions: usize,
    /// Last always-on-top flag.
    pub always_on_top: Option<bool>,
    /// Window-color subscriptions handed out.
    pub window_color_subscriptions: usize,
    /// Window color the fake host reports on request.
    pub host_window_color: Option<String>,
    /// Times the window color was requested.
    pub window_color_requests: usize,
}

#[derive(Default)]
struct Inner {
    state: SurfaceState,
    scheme_tx: Vec<Sender<bool>>,
    color_tx: Vec<Sender<String>>,
}

/// Cloneable fake implementing [`LocaleHost`], [`StyleHost`],
/// [`DocumentHost`], [`ColorScheme`] and [`WindowHost`].
#[derive(Clone, Default)]
pub struct RecordingSurface {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingSurface {
    /// Empty surface: no bundles, no stylesheets, no elements.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the observed state.
    pub fn state(&self) -> SurfaceState {
        self.lock().state.clone()
    }

    /// Make a locale bundle loadable.
    #[must_use]
    pub fn with_bundle(self, name: &str) -> Self {
        self.lock()
            .state
            .bundles
            .insert(name.to_owned(), serde_json::json!({ "locale": name }));
        self
    }

    /// Set what `true_language` reports.
    #[must_use]
    pub fn with_true_language(self, lang: &str) -> Self {
        self.lock().state.true_language = lang.to_owned();
        self
    }

    /// Link a stylesheet.
    #[must_use]
    pub fn with_stylesheet(self, href: &str) -> Self {
        self.lock().state.stylesheets.push(href.to_owned());
        self
    }

    /// Make `href` fail the reachability probe.
    #[must_use]
    pub fn with_unreachable(self, href: &str) -> Self {
        self.lock().state.unreachable.insert(href.to_owned());
        self
    }

    /// Provide a computed root property.
    #[must_use]
    pub fn with_computed(self, name: &str, value: &str) -> Self {
        self.lock()
            .state
            .computed
            .insert(name.to_owned(), value.to_owned());
        self
    }

    /// Add an element (with no classes).
    #[must_use]
    pub fn with_element(self, id: &str) -> Self {
        self.lock().state.classes.entry(id.to_owned()).or_default();
        self
    }

    /// Set the color the fake host reports on request.
    #[must_use]
    pub fn with_host_window_color(self, color: &str) -> Self {
        self.lock().state.host_window_color = Some(color.to_owned());
        self
    }

    /// Change the environment preference and notify subscribers.
    pub fn set_prefers_dark(&self, dark: bool) {
        let mut inner = self.lock();
        inner.state.prefers_dark = dark;
        inner.scheme_tx.retain(|tx| tx.send(dark).is_ok());
    }

    /// Broadcast a window color change to subscribers.
    pub fn push_window_color(&self, color: &str) {
        self.lock()
            .color_tx
            .retain(|tx| tx.send(color.to_owned()).is_ok());
    }

    /// Whether `element` currently carries `class`.
    pub fn element_has_class(&self, element: &str, class: &str) -> bool {
        self.lock()
            .state
            .classes
            .get(element)
            .is_some_and(|classes| classes.contains(class))
    }
}

impl LocaleHost for RecordingSurface {
    fn load_bundle(&self, name: &str) -> Option<Value> {
        self.lock().state.bundles.get(name).cloned()
    }

    fn install_bundle(&self, name: &str, _messages: Value) {
        self.lock().state.installed.push(name.to_owned());
    }

    fn set_locale(&self, name: &str) {
        self.lock().state.locale = Some(name.to_owned());
    }

    fn set_fallback_locale(&self, name: &str) {
        self.lock().state.fallback_locale = Some(name.to_owned());
    }

    fn true_language(&self) -> String {
        let inner = self.lock();
        if inner.state.true_language.is_empty() {
            inner.state.locale.clone().unwrap_or_default()
        } else {
            inner.state.true_language.clone()
        }
    }
}

impl StyleHost for RecordingSurface {
    fn stylesheet_hrefs(&self) -> Vec<String> {
        self.lock().state.stylesheets.clone()
    }

    fn probe(&self, href: &str) -> bool {
        let mut inner = self.lock();
        inner.state.probes.push(href.to_owned());
        !inner.state.unreachable.contains(href)
    }

    fn replace_stylesheet(&self, index: usize, href: &str) {
        if let Some(slot) = self.lock().state.stylesheets.get_mut(index) {
            *slot = href.to_owned();
        }
    }

    fn enable_color_transition(&self) {
        self.lock().state.transitions += 1;
    }

    fn set_root_property(&self, name: &str, value: &str) {
        self.lock()
            .state
            .root_properties
            .insert(name.to_owned(), value.to_owned());
    }

    fn computed_property(&self, name: &str) -> Option<String> {
        self.lock().state.computed.get(name).cloned()
    }

    fn set_theme_color_meta(&self, color: &str) {
        self.lock().state.theme_meta = Some(color.to_owned());
    }

    fn apply_window_color(&self, color: &str) {
        self.lock().state.window_color = Some(color.to_owned());
    }
}

impl DocumentHost for RecordingSurface {
    fn set_lang_attribute(&self, lang: &str) {
        self.lock().state.lang_attribute = Some(lang.to_owned());
    }

    fn set_viewport(&self, content: &str) {
        self.lock().state.viewport = Some(content.to_owned());
    }

    fn set_control_visible(&self, id: &str, visible: bool) {
        self.lock().state.controls.insert(id.to_owned(), visible);
    }

    fn has_class(&self, element: &str, class: &str) -> Option<bool> {
        self.lock()
            .state
            .classes
            .get(element)
            .map(|classes| classes.contains(class))
    }

    fn set_class(&self, element: &str, class: &str, present: bool) {
        if let Some(classes) = self.lock().state.classes.get_mut(element) {
            if present {
                classes.insert(class.to_owned());
            } else {
                classes.remove(class);
            }
        }
    }

    fn set_chat_view(&self, view: ChatView) {
        self.lock().state.chat_view = Some(view);
    }

    fn set_msg_type(&self, tag: f64) {
        self.lock().state.msg_type = Some(tag);
    }

    fn set_dark_mode(&self, dark: bool) {
        self.lock().state.dark_mode = Some(dark);
    }

    fn record_event(&self, category: &str, name: &str) {
        self.lock()
            .state
            .events
            .push((category.to_owned(), name.to_owned()));
    }
}

impl ColorScheme for RecordingSurface {
    fn prefers_dark(&self) -> bool {
        self.lock().state.prefers_dark
    }

    fn subscribe(&self) -> Receiver<bool> {
        let (tx, rx) = channel();
        let mut inner = self.lock();
        inner.state.scheme_subscriptions += 1;
        inner.scheme_tx.push(tx);
        rx
    }
}

impl WindowHost for RecordingSurface {
    fn set_always_on_top(&self, on_top: bool) {
        self.lock().state.always_on_top = Some(on_top);
    }

    fn subscribe_window_color(&self) -> Receiver<String> {
        let (tx, rx) = channel();
        let mut inner = self.lock();
        inner.state.window_color_subscriptions += 1;
        inner.color_tx.push(tx);
        rx
    }

    fn request_window_color(&self) {
        let mut inner = self.lock();
        inner.state.window_color_requests += 1;
        if let Some(color) = inner.state.host_window_color.clone() {
            inner.color_tx.retain(|tx| tx.send(color.clone()).is_ok());
        }
    }
}
