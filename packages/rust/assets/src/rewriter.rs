//! Rewrite remote asset references inside HTML to local files.
//!
//! Only attribute values are touched: every other byte of the input is
//! copied through unchanged, so rewriting never reformats markup.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use feedport_shared::Entry;
use futures_util::future::join_all;
use tracing::{debug, warn};
use url::Url;

use crate::store::AssetStore;
use crate::tokenizer;

/// Attributes that carry asset URLs, per tag.
fn url_attributes(tag: &str) -> &'static [&'static str] {
    match tag {
        "img" | "source" => &["src", "srcset"],
        "video" => &["src", "poster"],
        "link" => &["href"],
        "script" | "track" => &["src"],
        _ => &[],
    }
}

/// One attribute value to replace.
#[derive(Debug)]
struct Slot {
    range: Range<usize>,
    /// Unquoted values get quotes when replaced.
    quoted: bool,
    kind: SlotKind,
    content_type: Option<String>,
}

#[derive(Debug)]
enum SlotKind {
    /// Single URL.
    Url(String),
    /// `srcset`: candidate URLs with their descriptors.
    SrcSet(Vec<(String, String)>),
}

pub struct HtmlAssetRewriter {
    store: Arc<AssetStore>,
}

impl HtmlAssetRewriter {
    pub fn new(store: Arc<AssetStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    /// Download every remote asset `html` references and point the
    /// references at the local copies. An asset that cannot be fetched
    /// keeps its original URL.
    pub async fn rewrite(&self, html: &str, entry: &Entry) -> String {
        let base = Url::parse(&entry.url).ok();
        let slots = find_slots(html, base.as_ref());
        if slots.is_empty() {
            return html.to_owned();
        }

        let mut wanted: Vec<(&str, Option<&str>)> = Vec::new();
        for slot in &slots {
            let ct = slot.content_type.as_deref();
            match &slot.kind {
                SlotKind::Url(url) => wanted.push((url.as_str(), ct)),
                SlotKind::SrcSet(candidates) => {
                    wanted.extend(candidates.iter().map(|(url, _)| (url.as_str(), None)))
                }
            }
        }
        let mut seen = HashSet::new();
        wanted.retain(|(url, _)| seen.insert(*url));

        let document = entry.file_path.as_deref();
        let resolved = join_all(
            wanted
                .iter()
                .map(|(url, ct)| self.resolve_one(url, *ct, document)),
        )
        .await;
        let references: HashMap<&str, String> = wanted
            .iter()
            .zip(resolved)
            .filter_map(|((url, _), reference)| reference.map(|r| (*url, r)))
            .collect();

        debug!(
            found = wanted.len(),
            resolved = references.len(),
            entry = %entry.url,
            "rewrote asset references"
        );

        splice(html, &slots, &references)
    }

    async fn resolve_one(
        &self,
        url: &str,
        content_type: Option<&str>,
        document: Option<&Path>,
    ) -> Option<String> {
        match self.store.resolve(url, content_type, document).await {
            Ok(record) => Some(record.reference),
            Err(e) => {
                warn!(%url, error = %e, "asset left remote");
                None
            }
        }
    }
}

/// Absolute http(s) URL for a raw attribute value, or `None` when the
/// value names nothing downloadable.
fn absolute_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw.trim());
    let value = decoded.as_ref();
    if value.is_empty()
        || value.starts_with('#')
        || value.starts_with("data:")
        || value.starts_with("blob:")
    {
        return None;
    }
    let url = match base {
        Some(base) => base.join(value).ok()?,
        None => Url::parse(value).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn parse_srcset(raw: &str, base: Option<&Url>) -> Vec<(String, String)> {
    html_escape::decode_html_entities(raw)
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = absolute_url(parts.next()?, base)?;
            let descriptor = parts.collect::<Vec<_>>().join(" ");
            Some((url, descriptor))
        })
        .collect()
}

fn find_slots(html: &str, base: Option<&Url>) -> Vec<Slot> {
    let mut slots = Vec::new();
    for tag in tokenizer::start_tags(html) {
        let allowed = url_attributes(&tag.name);
        if allowed.is_empty() {
            continue;
        }
        let content_type = tag
            .attribute("type")
            .map(|a| a.value.trim())
            .filter(|t| t.contains('/'))
            .map(str::to_owned);

        for attr in &tag.attributes {
            if !allowed.contains(&attr.name.as_str()) {
                continue;
            }
            let kind = if attr.name == "srcset" {
                let candidates = parse_srcset(attr.value, base);
                if candidates.is_empty() {
                    continue;
                }
                SlotKind::SrcSet(candidates)
            } else {
                match absolute_url(attr.value, base) {
                    Some(url) => SlotKind::Url(url),
                    None => continue,
                }
            };
            slots.push(Slot {
                range: attr.range.clone(),
                quoted: attr.quoted,
                kind,
                content_type: content_type.clone(),
            });
        }
    }
    slots
}

/// Copy `html` with resolved references substituted into each slot.
fn splice(html: &str, slots: &[Slot], references: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for slot in slots {
        let replacement = match &slot.kind {
            SlotKind::Url(url) => references.get(url.as_str()).cloned(),
            SlotKind::SrcSet(candidates) => Some(
                candidates
                    .iter()
                    .map(|(url, descriptor)| {
                        let target = references.get(url.as_str()).map_or(url.as_str(), String::as_str);
                        if descriptor.is_empty() {
                            target.to_owned()
                        } else {
                            format!("{target} {descriptor}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        };
        if let Some(replacement) = replacement {
            let encoded = html_escape::encode_double_quoted_attribute(&replacement);
            out.push_str(&html[cursor..slot.range.start]);
            if slot.quoted {
                out.push_str(&encoded);
            } else {
                out.push('"');
                out.push_str(&encoded);
                out.push('"');
            }
            cursor = slot.range.end;
        }
    }
    out.push_str(&html[cursor..]);
    out
}
