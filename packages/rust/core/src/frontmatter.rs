//! YAML front matter and document assembly.

use std::fmt::Write as _;
use std::sync::LazyLock;

use feedport_shared::{Entry, FeedportError, Result};
use regex::Regex;
use serde_json::{Map, Value};

/// Serialized entry keys that never appear in front matter.
const OMITTED_KEYS: &[&str] = &["content", "contentType", "dateUpdated", "filePath"];

/// Keys emitted first, in this order. The rest follow alphabetically.
const LEADING_KEYS: &[&str] = &["title", "uuid", "type", "url", "date", "status", "authors", "tags"];

static PLAIN_SCALAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_/][A-Za-z0-9 _./@+,()'-]*(?::+[A-Za-z0-9_./@+-][A-Za-z0-9 _./@+,()'-]*)*$")
        .expect("valid regex")
});

/// Plain strings a YAML 1.1 reader would resolve to something else:
/// timestamps, base-60 numbers, prefixed or underscored numbers, and the
/// float specials.
static TYPED_SCALAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\d{4}-\d{1,2}-\d{1,2}(?:$|[Tt\s])
        | ^[-+]?\d[\d_]*(?::[0-5]?\d)+(?:\.[\d_]*)?$
        | ^[-+]?0(?:[xX][0-9a-fA-F_]+|[oO][0-7_]+|[bB][01_]+)$
        | ^[-+]?\d[\d_]*(?:\.[\d_]*)?(?:[eE][-+]?\d+)?$
        | ^[-+]?\.(?:inf|Inf|INF)$
        | ^\.(?:nan|NaN|NAN)$",
    )
    .expect("valid regex")
});

/// Full file contents: front matter block, then the body.
pub fn render_document(entry: &Entry) -> Result<String> {
    Ok(format!("---\n{}---\n{}", front_matter(entry)?, entry.content))
}

/// Front matter YAML (without the `---` fences) for an entry.
///
/// Drafts get `permalink: false` and `draft: true` so static site
/// generators keep them out of the build.
pub fn front_matter(entry: &Entry) -> Result<String> {
    let Value::Object(mut data) = serde_json::to_value(entry)
        .map_err(|e| FeedportError::validation(format!("failed to serialize entry: {e}")))?
    else {
        return Err(FeedportError::validation("entry did not serialize to an object"));
    };
    for key in OMITTED_KEYS {
        data.remove(*key);
    }
    if entry.is_draft() {
        data.insert("permalink".into(), Value::Bool(false));
        data.insert("draft".into(), Value::Bool(true));
    }

    let mut ordered: Vec<(&str, &Value)> = LEADING_KEYS
        .iter()
        .filter_map(|key| data.get(*key).map(|value| (*key, value)))
        .collect();
    let mut rest: Vec<(&str, &Value)> = data
        .iter()
        .map(|(key, value)| (key.as_str(), value))
        .filter(|(key, _)| !LEADING_KEYS.contains(key))
        .collect();
    rest.sort_by(|a, b| a.0.cmp(b.0));
    ordered.extend(rest);

    let mut out = String::new();
    for (key, value) in ordered {
        write_entry(&mut out, 0, key, value);
    }
    Ok(out)
}

fn write_entry(out: &mut String, indent: usize, key: &str, value: &Value) {
    let pad = " ".repeat(indent);
    let key = scalar(key);
    match value {
        Value::Object(map) if !map.is_empty() => {
            let _ = writeln!(out, "{pad}{key}:");
            write_map(out, indent + 2, map);
        }
        Value::Array(items) if !items.is_empty() => {
            let _ = writeln!(out, "{pad}{key}:");
            write_seq(out, indent + 2, items);
        }
        other => {
            let _ = writeln!(out, "{pad}{key}: {}", inline(other));
        }
    }
}

fn write_map(out: &mut String, indent: usize, map: &Map<String, Value>) {
    for (key, value) in map {
        write_entry(out, indent, key, value);
    }
}

fn write_seq(out: &mut String, indent: usize, items: &[Value]) {
    let pad = " ".repeat(indent);
    for item in items {
        match item {
            Value::Object(map) if !map.is_empty() => {
                // First key shares the dash line; the rest align under it.
                let mut nested = String::new();
                write_map(&mut nested, indent + 2, map);
                let body = nested.get(indent + 2..).unwrap_or_default();
                let _ = write!(out, "{pad}- {body}");
            }
            Value::Array(inner) if !inner.is_empty() => {
                let _ = writeln!(out, "{pad}-");
                write_seq(out, indent + 2, inner);
            }
            other => {
                let _ = writeln!(out, "{pad}- {}", inline(other));
            }
        }
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => scalar(s),
        Value::Array(_) => "[]".into(),
        Value::Object(_) => "{}".into(),
    }
}

/// A string as a YAML scalar: plain when unambiguous, otherwise
/// double-quoted with JSON escapes (a subset of YAML's).
fn scalar(s: &str) -> String {
    let ambiguous = matches!(
        s.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "y" | "n" | "on" | "off" | "null" | "~" | ""
    ) || s.parse::<f64>().is_ok()
        || TYPED_SCALAR_RE.is_match(s)
        || s.ends_with(' ');
    if !ambiguous && PLAIN_SCALAR_RE.is_match(s) {
        s.to_owned()
    } else {
        Value::String(s.to_owned()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use feedport_shared::{Author, ContentType, EntryStatus, SourceKind};
    use serde_json::json;
    use std::path::PathBuf;

    fn entry() -> Entry {
        let mut metadata = Map::new();
        metadata.insert("featuredImage".into(), json!("/assets/cat-abc.jpg"));
        metadata.insert(
            "opengraphImage".into(),
            json!({"height": 630, "width": 1200}),
        );
        Entry {
            uuid: "feedport::wordpress::42".into(),
            kind: SourceKind::WordPress,
            title: "Hello: a \"quoted\" post".into(),
            url: "https://blog.example/hello/".into(),
            authors: vec![Author {
                name: "Zach".into(),
                url: Some("https://zach.example/".into()),
                avatar_url: None,
            }],
            date: chrono::Utc.with_ymd_and_hms(2024, 3, 5, 16, 7, 9).unwrap(),
            date_updated: Some(chrono::Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap()),
            content: "Body text".into(),
            content_type: Some(ContentType::Markdown),
            status: Some(EntryStatus::Publish),
            tags: vec!["rust".into(), "2024".into()],
            metadata,
            file_path: Some(PathBuf::from("out/hello.md")),
            source_label: None,
            origin: None,
        }
    }

    #[test]
    fn renders_front_matter_and_body() {
        let doc = render_document(&entry()).unwrap();
        let expected = "---
title: \"Hello: a \\\"quoted\\\" post\"
uuid: feedport::wordpress::42
type: wordpress
url: https://blog.example/hello/
date: \"2024-03-05T16:07:09Z\"
status: publish
authors:
  - name: Zach
    url: https://zach.example/
tags:
  - rust
  - \"2024\"
metadata:
  featuredImage: /assets/cat-abc.jpg
  opengraphImage:
    height: 630
    width: 1200
---
Body text";
        assert_eq!(doc, expected);
    }

    #[test]
    fn drafts_are_marked_unpublishable() {
        let mut e = entry();
        e.status = Some(EntryStatus::Draft);
        let fm = front_matter(&e).unwrap();
        assert!(fm.contains("status: draft\n"));
        assert!(fm.contains("permalink: false\n"));
        assert!(fm.contains("draft: true\n"));
    }

    #[test]
    fn internal_fields_are_omitted() {
        let fm = front_matter(&entry()).unwrap();
        assert!(!fm.contains("content"));
        assert!(!fm.contains("dateUpdated"));
        assert!(!fm.contains("filePath"));
    }

    #[test]
    fn ambiguous_scalars_are_quoted() {
        assert_eq!(scalar("true"), "\"true\"");
        assert_eq!(scalar("12"), "\"12\"");
        assert_eq!(scalar("# heading"), "\"# heading\"");
        assert_eq!(scalar("a: b"), "\"a: b\"");
        assert_eq!(scalar("plain words"), "plain words");
    }

    #[test]
    fn typed_looking_strings_are_quoted() {
        for s in [
            "2021-05-04",
            "2021-5-4",
            "2024-03-05T16:07:09Z",
            "2024-03-05 16:07:09",
            "12:30",
            "-1:20:45.5",
            "0x1A",
            "0o17",
            "0b1010",
            "1_000",
            "3.14_15",
            ".inf",
            "-.Inf",
            ".NaN",
            "y",
            "N",
        ] {
            assert_eq!(scalar(s), format!("\"{s}\""), "{s}");
        }
    }

    #[test]
    fn version_and_word_strings_stay_plain() {
        for s in ["v1.2.3", "release 2021-05-04", "0xdeadbeef-patch", "x1_000", "Yes please"] {
            assert_eq!(scalar(s), s, "{s}");
        }
    }
}
