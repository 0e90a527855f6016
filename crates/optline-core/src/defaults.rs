// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Option default table: values backfilled for names missing after a load.
//! Defaults are never dispatched to handlers.

use crate::codec::OptionMap;
use serde_json::json;

/// Built-in defaults.
pub fn builtin() -> OptionMap {
    [
        ("opt_dark", json!(false)),
        ("opt_auto_dark", json!(true)),
        ("language", json!("zh-CN")),
        ("log_level", json!("err")),
        ("open_ga_bot", json!(true)),
        ("initial_scale", json!(0.85)),
        ("fs_adaptation", json!(0)),
        ("theme_color", json!(0)),
        ("chat_background_blur", json!(0)),
        ("msg_type", json!(2)),
        // Kept as text; `get` re-parses it into an empty list.
        ("store_face", json!("[]")),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value))
    .collect()
}

/// Parse a default table from a JSON object.
pub fn from_json(text: &str) -> Result<OptionMap, serde_json::Error> {
    serde_json::from_str(text)
}

/// Insert every default whose name is absent from `entries`.
/// Returns the names that were filled.
pub fn backfill(entries: &mut OptionMap, defaults: &OptionMap) -> Vec<String> {
    let mut filled = Vec::new();
    for (name, value) in defaults {
        if !entries.contains_key(name) {
            entries.insert(name.clone(), value.clone());
            filled.push(name.clone());
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn builtin_table_matches_application_defaults() {
        let table = builtin();
        assert_eq!(table.len(), 11);
        assert_eq!(table["language"], json!("zh-CN"));
        assert_eq!(table["initial_scale"], json!(0.85));
        assert_eq!(table["store_face"], json!("[]"));
    }

    #[test]
    fn backfill_only_touches_absent_names() {
        let mut entries = OptionMap::new();
        entries.insert("opt_dark".into(), json!(true));
        entries.insert("language".into(), Value::Null);
        let filled = backfill(&mut entries, &builtin());

        assert_eq!(entries["opt_dark"], json!(true));
        assert_eq!(entries["language"], Value::Null);
        assert!(!filled.contains(&"opt_dark".to_owned()));
        assert!(filled.contains(&"msg_type".to_owned()));
        assert_eq!(entries.len(), 11);
    }

    #[test]
    fn table_parses_from_json_object() {
        let table = from_json(r#"{"opt_dark": true, "theme_color": 3}"#).unwrap();
        assert_eq!(table["theme_color"], json!(3));
        assert!(from_json("[1, 2]").is_err());
    }
}
