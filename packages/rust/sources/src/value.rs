//! Accessors for decoded payload trees.
//!
//! XML-derived trees turn a single child into an object and repeated
//! children into arrays, and text may sit under `#text`. These helpers
//! hide both quirks from the adapters.

use serde_json::Value;

/// Treat a field as a list: arrays as-is, any other present value as a
/// one-element list, missing or null as empty.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Text content of a node: strings, numbers and booleans directly,
/// objects via their `#text` key. Empty text counts as missing.
pub fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(obj) => return text(obj.get("#text")),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Shorthand for `text(value.get(key))`.
pub fn field(value: &Value, key: &str) -> Option<String> {
    text(value.get(key))
}

/// An XML attribute value (`@_name`).
pub fn attr<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(format!("@_{name}").as_str())?.as_str()
}

/// Whether `s` is an absolute http(s) URL.
pub fn is_http_url(s: &str) -> bool {
    (s.starts_with("https://") || s.starts_with("http://")) && url::Url::parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_normalization() {
        let v = json!({ "one": {"a": 1}, "many": [1, 2], "none": null });
        assert_eq!(as_list(v.get("one")).len(), 1);
        assert_eq!(as_list(v.get("many")).len(), 2);
        assert!(as_list(v.get("none")).is_empty());
        assert!(as_list(v.get("missing")).is_empty());
    }

    #[test]
    fn text_extraction() {
        let v = json!({ "guid": {"@_isPermaLink": "false", "#text": "abc"}, "n": 5, "blank": " " });
        assert_eq!(field(&v, "guid").as_deref(), Some("abc"));
        assert_eq!(field(&v, "n").as_deref(), Some("5"));
        assert_eq!(field(&v, "blank"), None);
        assert_eq!(attr(&v["guid"], "isPermaLink"), Some("false"));
    }

    #[test]
    fn http_url_check() {
        assert!(is_http_url("https://example.com/a"));
        assert!(!is_http_url("tag:example.com,2024:1"));
        assert!(!is_http_url("/relative"));
    }
}
