//! Ordered element handlers run before `htmd` sees the markup.
//!
//! The tree is re-serialized node by node. For each element the rules are
//! tried in [`RULES`] order and the first one that claims the element wins;
//! unclaimed elements are re-serialized unchanged. A claimed element is
//! replaced by a placeholder token and its output substituted after
//! conversion, so rule output is never re-escaped.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node, Selector};
use tracing::warn;

use crate::MarkdownDowngrader;
use crate::code::{fenced_block, language_from_class};

/// Placeholder delimiters, from the Unicode Private Use Area. Both are
/// stripped from input text, so a token can only come from a rule.
const SLOT_OPEN: char = '\u{E000}';
const SLOT_CLOSE: char = '\u{E001}';

pub(crate) static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{SLOT_OPEN}(\\d+){SLOT_CLOSE}")).expect("valid regex")
});

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));
static SOURCE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("source").expect("valid selector"));
static CODE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("code").expect("valid selector"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Preserved tags that sit on their own lines rather than inside text.
const BLOCK_ELEMENTS: &[&str] = &[
    "table", "details", "dl", "figure", "blockquote", "div", "section", "aside", "ul", "ol",
    "video", "audio", "iframe",
];

/// What a rule emits in place of an element.
pub(crate) enum Emit {
    Block(String),
    Inline(String),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Rule {
    CodeBlock,
    Picture,
    Image,
    Icon,
    Preserved,
}

/// Rules in precedence order.
pub(crate) const RULES: [Rule; 5] = [
    Rule::CodeBlock,
    Rule::Picture,
    Rule::Image,
    Rule::Icon,
    Rule::Preserved,
];

/// State for converting one document.
pub(crate) struct Conversion<'a> {
    pub downgrader: &'a MarkdownDowngrader,
    pub document: &'a Path,
    pub slots: Vec<String>,
}

impl Conversion<'_> {
    /// Serialize the children of `el`, applying rules to every element.
    pub fn render_children(&mut self, el: ElementRef<'_>, out: &mut String) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    out.push_str(&html_escape::encode_text(&strip_delimiters(text)))
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.render_element(child_el, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn render_element(&mut self, el: ElementRef<'_>, out: &mut String) {
        if let Some(emit) = RULES.iter().find_map(|rule| rule.apply(el, self)) {
            self.push_placeholder(emit, out);
            return;
        }

        let name = el.value().name();
        out.push('<');
        out.push_str(name);
        for (attr, value) in el.value().attrs() {
            let _ = write!(
                out,
                " {attr}=\"{}\"",
                html_escape::encode_double_quoted_attribute(&strip_delimiters(value))
            );
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&name) {
            return;
        }
        self.render_children(el, out);
        let _ = write!(out, "</{name}>");
    }

    fn push_placeholder(&mut self, emit: Emit, out: &mut String) {
        let (content, block) = match emit {
            Emit::Block(content) => (content, true),
            Emit::Inline(content) => (content, false),
        };
        if content.is_empty() {
            return;
        }
        let token = format!("{SLOT_OPEN}{}{SLOT_CLOSE}", self.slots.len());
        self.slots.push(content);
        if block {
            let _ = write!(out, "<p>{token}</p>");
        } else {
            out.push_str(&token);
        }
    }

    fn keep(&self, reference: &str) {
        self.downgrader.usage().keep(reference, self.document);
    }

    fn delete(&self, reference: &str) {
        self.downgrader.usage().delete(reference, self.document);
    }
}

impl Rule {
    fn apply(self, el: ElementRef<'_>, cx: &mut Conversion<'_>) -> Option<Emit> {
        let name = el.value().name();
        match self {
            Rule::CodeBlock => (name == "pre").then(|| code_block(el, cx)),
            Rule::Picture => (name == "picture").then(|| picture(el, cx)),
            Rule::Image => (name == "img").then(|| Emit::Inline(image(el, cx))),
            Rule::Icon => icon(el),
            Rule::Preserved => cx
                .downgrader
                .preserves(name)
                .then(|| preserved(el, cx)),
        }
    }
}

// ---------------------------------------------------------------------------
// Code blocks
// ---------------------------------------------------------------------------

fn code_block(el: ElementRef<'_>, cx: &Conversion<'_>) -> Emit {
    let language = el
        .value()
        .attr("class")
        .and_then(language_from_class)
        .or_else(|| {
            el.select(&CODE_SELECTOR)
                .next()
                .and_then(|code| code.value().attr("class"))
                .and_then(language_from_class)
        });

    let raw: String = el.text().collect();
    let code = match language
        .as_deref()
        .and_then(|lang| cx.downgrader.formatter(lang))
    {
        Some(formatter) => formatter.format(&raw).unwrap_or_else(|e| {
            warn!(
                language = language.as_deref().unwrap_or_default(),
                error = %e,
                "code formatting failed, keeping original"
            );
            raw.clone()
        }),
        None => raw.clone(),
    };

    Emit::Block(fenced_block(&code, language.as_deref()))
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// `(url, weight)` pairs from a `srcset` value. A width or density
/// descriptor gives the weight; no descriptor means `1x`.
fn srcset_candidates(srcset: &str) -> Vec<(String, f64)> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?.to_owned();
            let weight = parts
                .next()
                .and_then(|d| d.get(..d.len().saturating_sub(1)))
                .and_then(|n| n.parse::<f64>().ok())
                .unwrap_or(1.0);
            Some((url, weight))
        })
        .collect()
}

fn image(el: ElementRef<'_>, cx: &Conversion<'_>) -> String {
    let src = el
        .value()
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let candidates = el
        .value()
        .attr("srcset")
        .map(srcset_candidates)
        .unwrap_or_default();

    let best = candidates
        .iter()
        .fold(None::<&(String, f64)>, |best, c| match best {
            Some(b) if b.1 >= c.1 => Some(b),
            _ => Some(c),
        })
        .map(|(url, _)| url.as_str());

    let Some(chosen) = best.or(src) else {
        return String::new();
    };
    for (url, _) in &candidates {
        if url != chosen {
            cx.delete(url);
        }
    }
    if let Some(src) = src.filter(|s| *s != chosen) {
        cx.delete(src);
    }
    cx.keep(chosen);

    markdown_image(
        el.value().attr("alt").unwrap_or_default(),
        chosen,
        el.value().attr("title"),
    )
}

fn markdown_image(alt: &str, url: &str, title: Option<&str>) -> String {
    let alt = alt.replace('[', "\\[").replace(']', "\\]");
    let url = if url.contains([' ', '(', ')']) {
        format!("<{url}>")
    } else {
        url.to_owned()
    };
    match title.filter(|t| !t.is_empty()) {
        Some(title) => format!("![{alt}]({url} \"{}\")", title.replace('"', "\\\"")),
        None => format!("![{alt}]({url})"),
    }
}

/// A `<picture>` renders as its `<img>`; every `<source>` variant is
/// redundant once that image is chosen.
fn picture(el: ElementRef<'_>, cx: &Conversion<'_>) -> Emit {
    for source in el.select(&SOURCE_SELECTOR) {
        if let Some(srcset) = source.value().attr("srcset") {
            for (url, _) in srcset_candidates(srcset) {
                cx.delete(&url);
            }
        }
        if let Some(src) = source.value().attr("src") {
            cx.delete(src.trim());
        }
    }
    Emit::Inline(
        el.select(&IMG_SELECTOR)
            .next()
            .map(|img| image(img, cx))
            .unwrap_or_default(),
    )
}

// ---------------------------------------------------------------------------
// Icons
fn strip_delimiters(text: &str) -> Cow<'_, str> {
    if text.contains([SLOT_OPEN, SLOT_CLOSE]) {
        Cow::Owned(text.replace([SLOT_OPEN, SLOT_CLOSE], ""))
    } else {
        Cow::Borrowed(text)
    }
}

// ---------------------------------------------------------------------------

fn is_icon_class(class: &str) -> bool {
    matches!(class, "fa" | "fas" | "far" | "fab" | "icon")
        || class.starts_with("fa-")
        || class.starts_with("icon-")
}

fn icon(el: ElementRef<'_>) -> Option<Emit> {
    let name = el.value().name();
    if !matches!(name, "svg" | "i" | "span") {
        return None;
    }
    let classes: Vec<&str> = el.value().classes().collect();
    if name != "svg" && !classes.iter().any(|c| is_icon_class(c)) {
        return None;
    }
    // Drawing content is dropped; the element and its classes stay.
    if classes.is_empty() {
        return Some(Emit::Inline(format!("<{name}></{name}>")));
    }
    Some(Emit::Inline(format!(
        "<{name} class=\"{}\"></{name}>",
        html_escape::encode_double_quoted_attribute(&classes.join(" "))
    )))
}

// ---------------------------------------------------------------------------
// Preserved markup
// ---------------------------------------------------------------------------

fn preserved(el: ElementRef<'_>, cx: &Conversion<'_>) -> Emit {
    for img in el.select(&IMG_SELECTOR) {
        if let Some(src) = img.value().attr("src") {
            cx.keep(src.trim());
        }
        if let Some(srcset) = img.value().attr("srcset") {
            for (url, _) in srcset_candidates(srcset) {
                cx.keep(&url);
            }
        }
    }
    let html = el.html();
    if BLOCK_ELEMENTS.contains(&el.value().name()) {
        Emit::Block(html)
    } else {
        Emit::Inline(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srcset_weights() {
        let c = srcset_candidates("a.jpg 1x, b.jpg 2x,c.jpg");
        assert_eq!(
            c,
            vec![
                ("a.jpg".to_owned(), 1.0),
                ("b.jpg".to_owned(), 2.0),
                ("c.jpg".to_owned(), 1.0)
            ]
        );
        let w = srcset_candidates("s.jpg 300w, l.jpg 1024w");
        assert_eq!(w[1].1, 1024.0);
    }

    #[test]
    fn image_markdown_escapes() {
        assert_eq!(markdown_image("a [b]", "x.png", None), "![a \\[b\\]](x.png)");
        assert_eq!(
            markdown_image("", "my file.png", Some("Say \"hi\"")),
            "![](<my file.png> \"Say \\\"hi\\\"\")"
        );
    }

    #[test]
    fn delimiters_are_stripped_from_text() {
        assert_eq!(strip_delimiters("plain"), "plain");
        assert_eq!(strip_delimiters("a\u{E000}0\u{E001}b"), "a0b");
        assert!(!PLACEHOLDER_RE.is_match("feedportslot0end"));
    }

    #[test]
    fn icon_classes() {
        assert!(is_icon_class("fa"));
        assert!(is_icon_class("fa-github"));
        assert!(is_icon_class("icon-star"));
        assert!(!is_icon_class("facebook"));
        assert!(!is_icon_class("iconic"));
    }
}
