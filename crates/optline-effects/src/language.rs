// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `language`: load and activate a locale bundle, then its fallback.

use crate::ports::{DocumentHost, LocaleHost};
use optline_core::{Effect, EffectCx, EffectKey, NoticeKind, OptionValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fallback locale when the language table names none.
pub const DEFAULT_FALLBACK: &str = "zh-CN";

/// One row of the language-config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    /// Display name.
    pub name: String,
    /// Bundle name stored in the `language` option.
    pub value: String,
    /// Bundle to fall back on for missing messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// Declarative language-config table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTable {
    entries: Vec<LanguageEntry>,
}

impl LanguageTable {
    /// Build from entries.
    pub fn new(entries: Vec<LanguageEntry>) -> Self {
        Self { entries }
    }

    /// Parse a JSON array of `{name, value, fallback?}`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Fallback configured for the bundle `value`, if any.
    ///
    /// Rows with a matching value but no (or an empty) fallback are passed
    /// over in favour of a later row that has one.
    pub fn fallback_for(&self, value: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.value == value)
            .find_map(|entry| entry.fallback.as_deref().filter(|f| !f.is_empty()))
    }

    /// All rows.
    pub fn entries(&self) -> &[LanguageEntry] {
        &self.entries
    }
}

/// Handler for [`EffectKey::Language`].
pub struct Language<L, D> {
    locale: L,
    document: D,
    table: LanguageTable,
}

impl<L, D> Language<L, D> {
    /// Create the handler.
    pub fn new(locale: L, document: D, table: LanguageTable) -> Self {
        Self {
            locale,
            document,
            table,
        }
    }
}

impl<L: LocaleHost, D: DocumentHost> Effect for Language<L, D> {
    fn key(&self) -> EffectKey {
        EffectKey::Language
    }

    fn apply(&mut self, value: &OptionValue, cx: &mut EffectCx<'_>) {
        let Some(name) = value.as_str() else {
            debug!(%value, "language is not a bundle name; skipping");
            return;
        };

        let Some(messages) = self.locale.load_bundle(name) else {
            cx.notify(
                NoticeKind::Error,
                "Language could not be changed",
                Some(format!("bundle `{name}` is unreachable")),
            );
            return;
        };
        self.locale.install_bundle(name, messages);
        self.locale.set_locale(name);

        match self.table.fallback_for(name) {
            Some(fallback) => match self.locale.load_bundle(fallback) {
                Some(messages) => {
                    self.locale.install_bundle(fallback, messages);
                    self.locale.set_fallback_locale(fallback);
                }
                None => {
                    cx.notify(
                        NoticeKind::Warn,
                        "Fallback language unavailable",
                        Some(format!("bundle `{fallback}` is unreachable")),
                    );
                }
            },
            None => self.locale.set_fallback_locale(DEFAULT_FALLBACK),
        }

        self.document
            .set_lang_attribute(&self.locale.true_language());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses_optional_fallback() {
        let table = LanguageTable::from_json(
            r#"[
                {"name": "English", "value": "en-US"},
                {"name": "Xx", "value": "xx", "fallback": "zz"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.fallback_for("xx"), Some("zz"));
        assert_eq!(table.fallback_for("en-US"), None);
        assert_eq!(table.fallback_for("nope"), None);
    }

    #[test]
    fn rows_without_fallback_are_passed_over() {
        let table = LanguageTable::new(vec![
            LanguageEntry {
                name: "a".into(),
                value: "xx".into(),
                fallback: Some(String::new()),
            },
            LanguageEntry {
                name: "b".into(),
                value: "xx".into(),
                fallback: Some("yy".into()),
            },
        ]);
        assert_eq!(table.fallback_for("xx"), Some("yy"));
    }
}
