//! Start-tag lexer that reports where each attribute value sits in the
//! source.
//!
//! The tag and attribute states follow the HTML tokenizer, so a `>` inside a
//! quoted value never closes a tag and text inside a value is never read as
//! an attribute. Comments, doctypes, processing instructions and the bodies
//! of raw-text elements are skipped. Tree construction is not modelled: a
//! start tag is reported where it appears in the source.

use std::ops::Range;

/// Elements whose content runs as plain text up to the matching end tag.
const RAW_TEXT: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

/// One attribute as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute<'a> {
    /// ASCII-lowercased name.
    pub name: String,
    /// Raw value with entities left encoded. Empty for a bare attribute.
    pub value: &'a str,
    /// Byte range of `value` in the source.
    pub range: Range<usize>,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartTag<'a> {
    /// ASCII-lowercased tag name.
    pub name: String,
    /// In source order. A repeated attribute keeps its first occurrence.
    pub attributes: Vec<Attribute<'a>>,
}

impl StartTag<'_> {
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'_>> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Every start tag in `html`, in source order.
pub(crate) fn start_tags(html: &str) -> Vec<StartTag<'_>> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'<') {
        let open = pos + offset;
        let rest = &bytes[open + 1..];
        pos = match rest.first() {
            Some(b'!') if rest.starts_with(b"!--") => skip_comment(bytes, open + 4),
            Some(b'!' | b'?') => skip_past(bytes, open + 2, b'>'),
            Some(b'/') => match rest.get(1) {
                Some(b) if b.is_ascii_alphabetic() => {
                    lex_tag(html, open + 2).map_or(bytes.len(), |(_, end)| end)
                }
                Some(b'>') => open + 3,
                _ => skip_past(bytes, open + 2, b'>'),
            },
            Some(b) if b.is_ascii_alphabetic() => match lex_tag(html, open + 1) {
                Some((tag, end)) => {
                    let next = if tag.name == "plaintext" {
                        bytes.len()
                    } else if RAW_TEXT.contains(&tag.name.as_str()) {
                        raw_text_end(bytes, end, &tag.name)
                    } else {
                        end
                    };
                    tags.push(tag);
                    next
                }
                // A tag cut off by the end of input is dropped.
                None => bytes.len(),
            },
            _ => open + 1,
        };
    }
    tags
}

fn is_space(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Index just past the next `stop` at or after `from`, or the end of input.
fn skip_past(bytes: &[u8], from: usize, stop: u8) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == stop)
        .map_or(bytes.len(), |i| from + i + 1)
}

/// `from` is the first byte after `<!--`.
fn skip_comment(bytes: &[u8], from: usize) -> usize {
    let body = &bytes[from..];
    if body.starts_with(b">") {
        return from + 1;
    }
    if body.starts_with(b"->") {
        return from + 2;
    }
    find(body, b"-->").map_or(bytes.len(), |i| from + i + 3)
}

/// Position of the `</name` that closes a raw-text element.
fn raw_text_end(bytes: &[u8], from: usize, name: &str) -> usize {
    let name = name.as_bytes();
    let mut pos = from;
    while let Some(offset) = find(&bytes[pos..], b"</") {
        let open = pos + offset;
        let after = open + 2 + name.len();
        let same_name = bytes
            .get(open + 2..after)
            .is_some_and(|n| n.eq_ignore_ascii_case(name));
        let terminated = bytes
            .get(after)
            .is_none_or(|&b| is_space(b) || matches!(b, b'/' | b'>'));
        if same_name && terminated {
            return open;
        }
        pos = open + 2;
    }
    bytes.len()
}

/// Lex one tag whose name starts at `start`. Returns the tag and the index
/// just past its closing `>`, or `None` if the input ends inside the tag.
fn lex_tag(html: &str, start: usize) -> Option<(StartTag<'_>, usize)> {
    let bytes = html.as_bytes();
    let ends_name = |b: u8| is_space(b) || matches!(b, b'/' | b'>');

    let mut pos = start;
    while pos < bytes.len() && !ends_name(bytes[pos]) {
        pos += 1;
    }
    let name = html[start..pos].to_ascii_lowercase();
    let mut attributes: Vec<Attribute<'_>> = Vec::new();

    loop {
        while pos < bytes.len() && (is_space(bytes[pos]) || bytes[pos] == b'/') {
            pos += 1;
        }
        if *bytes.get(pos)? == b'>' {
            return Some((StartTag { name, attributes }, pos + 1));
        }

        // An attribute name may begin with `=`.
        let name_start = pos;
        pos += 1;
        while pos < bytes.len() && !ends_name(bytes[pos]) && bytes[pos] != b'=' {
            pos += 1;
        }
        let attr_name = html[name_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && is_space(bytes[pos]) {
            pos += 1;
        }
        let mut quoted = false;
        let range = if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            while pos < bytes.len() && is_space(bytes[pos]) {
                pos += 1;
            }
            match *bytes.get(pos)? {
                quote @ (b'"' | b'\'') => {
                    let value_start = pos + 1;
                    let len = bytes[value_start..].iter().position(|&b| b == quote)?;
                    pos = value_start + len + 1;
                    quoted = true;
                    value_start..value_start + len
                }
                b'>' => pos..pos,
                _ => {
                    let value_start = pos;
                    while pos < bytes.len() && !is_space(bytes[pos]) && bytes[pos] != b'>' {
                        pos += 1;
                    }
                    value_start..pos
                }
            }
        } else {
            pos..pos
        };

        if !attributes.iter().any(|a| a.name == attr_name) {
            attributes.push(Attribute {
                name: attr_name,
                value: &html[range.clone()],
                range,
                quoted,
            });
        }
    }
}
