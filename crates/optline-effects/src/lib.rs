// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Apply handlers for the optline option pipeline.
//!
//! Each handler drives one or more collaborator ports ([`ports`]) and is
//! registered explicitly with an [`EffectRegistry`]. Hosts usually call
//! [`standard_registry`] once at startup.
#![forbid(unsafe_code)]

pub mod color;
pub mod language;
pub mod ports;
pub mod view;
pub mod window;

pub use color::{AutoDark, ColorMode, DarkMode, ThemeColor};
pub use language::{Language, LanguageEntry, LanguageTable, DEFAULT_FALLBACK};
pub use ports::{ChatView, ColorScheme, DocumentHost, LocaleHost, StyleHost, WindowHost};
pub use view::{ChatViewSelect, InitialScale, MsgType, Revolve};
pub use window::{AlwaysOnTop, AutoWindowColor};

use optline_core::EffectRegistry;

/// Register every handler against a single application surface.
///
/// `window` is `None` when running without a native host; the window
/// handlers are still registered and ignore their values.
pub fn standard_registry<H, W>(surface: H, window: Option<W>, languages: LanguageTable) -> EffectRegistry
where
    H: LocaleHost + StyleHost + DocumentHost + ColorScheme + Clone + 'static,
    W: WindowHost + Clone + 'static,
{
    EffectRegistry::new()
        .with(Language::new(surface.clone(), surface.clone(), languages))
        .with(DarkMode::new(surface.clone(), surface.clone()))
        .with(AutoDark::new(surface.clone(), surface.clone()))
        .with(ThemeColor::new(surface.clone()))
        .with(ChatViewSelect::new(surface.clone()))
        .with(InitialScale::new(surface.clone()))
        .with(MsgType::new(surface.clone()))
        .with(AutoWindowColor::new(window.clone(), surface.clone()))
        .with(Revolve::new(surface))
        .with(AlwaysOnTop::new(window))
}
