// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire codec: converts persisted option text into typed logical values and back.
//!
//! Decoding infers types without a schema: the `true`/`false`/`null` tokens
//! map to their primitives, everything else is URL-unescaped and parsed as
//! JSON, and text that is not JSON stays a plain string. A consequence is
//! that numeric-looking strings (`"5"`) come back as numbers.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Typed in-memory option value (boolean, number, string, structure or null).
pub type OptionValue = Value;

/// Mapping from option name to logical value.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// Persisted form of every option, keyed by name.
pub type WireRecord = BTreeMap<String, WireValue>;

/// Characters `encodeURIComponent` leaves untouched, inverted into an escape set.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A single persisted option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    /// Encoded text (always the case for Local-Store).
    Text(String),
    /// Native value handed back by a host bridge.
    Native(Value),
}

impl WireValue {
    /// Wire text for this value; native values are rendered as escaped text.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            WireValue::Text(text) => Cow::Borrowed(text),
            WireValue::Native(value) => match encode(value, WireEncoding::Escaped) {
                WireValue::Text(text) => Cow::Owned(text),
                WireValue::Native(other) => Cow::Owned(other.to_string()),
            },
        }
    }
}

impl From<&str> for WireValue {
    fn from(text: &str) -> Self {
        WireValue::Text(text.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(text: String) -> Self {
        WireValue::Text(text)
    }
}

/// How a backend wants logical values handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEncoding {
    /// Everything becomes URL-escaped text (Local-Store).
    Escaped,
    /// Structures become JSON text, scalars stay native (Host-Bridge).
    Native,
}

/// URL-escape text the way `encodeURIComponent` does.
pub fn escape(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

/// Reverse [`escape`]. Input that does not decode to UTF-8 is returned unchanged.
pub fn unescape(text: &str) -> Cow<'_, str> {
    percent_decode_str(text)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(text))
}

/// Decode a wire value into its logical value.
pub fn decode(raw: &WireValue) -> OptionValue {
    match raw {
        WireValue::Text(text) | WireValue::Native(Value::String(text)) => decode_text(text),
        WireValue::Native(value) => value.clone(),
    }
}

/// Decode wire text: primitive tokens first, then unescape + JSON, else plain string.
pub fn decode_text(text: &str) -> OptionValue {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            let plain = unescape(text);
            serde_json::from_str(&plain).unwrap_or_else(|_| Value::String(plain.into_owned()))
        }
    }
}

/// Encode a logical value for a backend.
pub fn encode(value: &OptionValue, encoding: WireEncoding) -> WireValue {
    match encoding {
        WireEncoding::Escaped => WireValue::Text(escape(&plain_text(value))),
        WireEncoding::Native => match value {
            Value::Object(_) | Value::Array(_) => WireValue::Text(value.to_string()),
            other => WireValue::Native(other.clone()),
        },
    }
}

/// Encode every entry of a map.
pub fn encode_record(map: &OptionMap, encoding: WireEncoding) -> WireRecord {
    map.iter()
        .map(|(name, value)| (name.clone(), encode(value, encoding)))
        .collect()
}

/// Text form of a value before escaping: strings verbatim, everything else as JSON.
fn plain_text(value: &OptionValue) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// JavaScript-style truthiness: `false`, `0`, `""` and `null` are falsy.
pub fn is_truthy(value: &OptionValue) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric reading of a value: numbers as-is, strings parsed after trimming.
pub fn as_number(value: &OptionValue) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(value: &OptionValue) -> OptionValue {
        decode(&encode(value, WireEncoding::Escaped))
    }

    #[test]
    fn primitive_tokens_decode_to_primitives() {
        assert_eq!(decode_text("true"), json!(true));
        assert_eq!(decode_text("false"), json!(false));
        assert_eq!(decode_text("null"), Value::Null);
    }

    #[test]
    fn escaped_json_decodes_to_structure() {
        let wire = escape(r#"{"a":[1,2],"b":"x y"}"#);
        assert!(!wire.contains('{'));
        assert_eq!(decode_text(&wire), json!({"a": [1, 2], "b": "x y"}));
    }

    #[test]
    fn plain_text_survives_parse_miss() {
        assert_eq!(decode_text("zh-CN"), json!("zh-CN"));
        assert_eq!(decode_text("hello%20world"), json!("hello world"));
    }

    #[test]
    fn numeric_looking_text_becomes_number() {
        assert_eq!(decode_text("5"), json!(5));
        assert_eq!(decode_text("0.85"), json!(0.85));
    }

    #[test]
    fn native_values_pass_through_but_native_strings_take_text_path() {
        assert_eq!(decode(&WireValue::Native(json!(3))), json!(3));
        assert_eq!(decode(&WireValue::Native(json!(true))), json!(true));
        assert_eq!(decode(&WireValue::Native(json!("[1]"))), json!([1]));
    }

    #[test]
    fn escape_matches_encode_uri_component() {
        assert_eq!(escape("a b&c:d"), "a%20b%26c%3Ad");
        assert_eq!(escape("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(escape("中"), "%E4%B8%AD");
    }

    #[test]
    fn invalid_utf8_escape_is_kept_verbatim() {
        assert_eq!(unescape("%FF%FE"), "%FF%FE");
    }

    #[test]
    fn round_trip_holds_for_supported_types() {
        for value in [
            json!(true),
            json!(false),
            Value::Null,
            json!(2),
            json!(0.85),
            json!(-17),
            json!("zh-CN"),
            json!("with spaces & colons: ok"),
            json!([1, "two", {"three": 3}]),
            json!({"nested": {"list": [true, null]}}),
            json!([]),
        ] {
            assert_eq!(round_trip(&value), value, "round trip of {value}");
        }
    }

    #[test]
    fn native_encoding_stringifies_structures_only() {
        assert_eq!(
            encode(&json!({"a": 1}), WireEncoding::Native),
            WireValue::Text(r#"{"a":1}"#.into())
        );
        assert_eq!(
            encode(&json!(1.5), WireEncoding::Native),
            WireValue::Native(json!(1.5))
        );
        assert_eq!(
            encode(&json!("a b"), WireEncoding::Native),
            WireValue::Native(json!("a b"))
        );
    }

    #[test]
    fn escaped_encoding_emits_literal_tokens() {
        assert_eq!(
            encode(&json!(true), WireEncoding::Escaped),
            WireValue::from("true")
        );
        assert_eq!(
            encode(&Value::Null, WireEncoding::Escaped),
            WireValue::from("null")
        );
        assert_eq!(encode(&json!(2), WireEncoding::Escaped), WireValue::from("2"));
    }

    #[test]
    fn truthiness_follows_javascript() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!(2)));
    }

    #[test]
    fn numbers_read_from_numeric_strings() {
        assert_eq!(as_number(&json!("2")), Some(2.0));
        assert_eq!(as_number(&json!(" 1.25 ")), Some(1.25));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!({"a": 1})), None);
    }
}
