//! XML decoding into a JSON-shaped tree.
//!
//! Feeds are read into `serde_json::Value` so adapters can treat XML and
//! JSON payloads the same way. Conventions:
//! - attributes become `@_name` keys
//! - element text becomes a plain string, or `#text` when the element also
//!   has attributes or children
//! - namespaced names are kept verbatim (`dc:creator`, `media:group`)
//! - CDATA is merged into text
//! - a repeated child becomes an array; a single child stays an object or
//!   string, so callers must accept both shapes

use feedport_shared::{FeedportError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

/// Prefix applied to attribute keys.
pub const ATTRIBUTE_PREFIX: &str = "@_";

/// Key holding element text when the element also carries attributes.
pub const TEXT_KEY: &str = "#text";

#[derive(Default)]
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Map::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let raw = String::from_utf8_lossy(&attr.value);
            attributes.insert(
                format!("{ATTRIBUTE_PREFIX}{key}"),
                Value::String(html_escape::decode_html_entities(&raw).into_owned()),
            );
        }
        Self {
            name,
            attributes,
            ..Self::default()
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.attributes.is_empty() && self.children.is_empty() {
            return Value::String(text.to_owned());
        }
        let mut obj = self.attributes;
        obj.extend(self.children);
        if !text.is_empty() {
            obj.insert(TEXT_KEY.into(), Value::String(text.to_owned()));
        }
        Value::Object(obj)
    }

    fn push_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }
}

/// Parse an XML document into a `serde_json::Value` tree rooted at an
/// object keyed by the document element's name.
pub fn parse_xml(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = vec![Frame::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)),
            Ok(Event::Empty(e)) => {
                let frame = Frame::open(&e);
                close(&mut stack, frame);
            }
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(&t);
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&html_escape::decode_html_entities(&raw));
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(FeedportError::parse("unbalanced XML end tag"));
                }
                if let Some(frame) = stack.pop() {
                    close(&mut stack, frame);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(FeedportError::parse(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if stack.len() != 1 {
        return Err(FeedportError::parse("unexpected end of XML document"));
    }
    let root = stack.pop().unwrap_or_default();
    Ok(Value::Object(root.children))
}

fn close(stack: &mut [Frame], frame: Frame) {
    if let Some(parent) = stack.last_mut() {
        let name = frame.name.clone();
        parent.push_child(name, frame.into_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_repeated_children() {
        let doc = parse_xml(
            r#"<rss><channel><title>One</title><item><title>A</title></item></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(doc["rss"]["channel"]["title"], "One");
        assert!(doc["rss"]["channel"]["item"].is_object());

        let doc = parse_xml(
            r#"<rss><channel><item><title>A</title></item><item><title>B</title></item></channel></rss>"#,
        )
        .unwrap();
        let items = doc["rss"]["channel"]["item"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["title"], "B");
    }

    #[test]
    fn attributes_and_text() {
        let doc = parse_xml(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><link rel="alternate" href="https://example.com/a"/><content type="html">&lt;p&gt;Hi&lt;/p&gt;</content></entry></feed>"#,
        )
        .unwrap();
        let entry = &doc["feed"]["entry"];
        assert_eq!(entry["link"]["@_href"], "https://example.com/a");
        assert_eq!(entry["content"]["@_type"], "html");
        assert_eq!(entry["content"]["#text"], "<p>Hi</p>");
        assert_eq!(doc["feed"]["@_xmlns"], "http://www.w3.org/2005/Atom");
    }

    #[test]
    fn cdata_and_namespaced_names() {
        let doc = parse_xml(
            r#"<item><dc:creator>Zach</dc:creator><content:encoded><![CDATA[<p>a & b</p>]]></content:encoded></item>"#,
        )
        .unwrap();
        assert_eq!(doc["item"]["dc:creator"], "Zach");
        assert_eq!(doc["item"]["content:encoded"], "<p>a & b</p>");
    }

    #[test]
    fn html_entities_in_text_are_decoded() {
        let doc = parse_xml("<title>Caf&eacute; &amp; more&nbsp;</title>").unwrap();
        assert_eq!(doc["title"], "Café & more");
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = parse_xml("<rss><channel></rss>").unwrap_err();
        assert!(matches!(err, FeedportError::Parse { .. }));
    }
}
