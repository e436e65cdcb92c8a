//! Clean-hash fingerprinting.
//!
//! Two hashes per capture: `content_hash` is SHA-1 over the raw response
//! bytes and exists for audit; `clean_hash` is the change-detection
//! fingerprint, computed from a canonical feature stream of the DOM with
//! noise (scripts, styles, ads) removed. Pages whose only difference is
//! noise produce identical clean hashes and are not re-archived.
//!
//! The hasher is pure and deterministic: identical bytes and identical
//! configuration yield bit-identical hashes across runs and hosts. The
//! configuration is therefore part of the fingerprint identity - changing it
//! invalidates every stored hash.

use std::collections::HashSet;

use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::warn;

use crate::config::HasherSettings;

/// SHA-1 as a 40-char lowercase hex string.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// The hash pair for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub content_hash: String,
    pub clean_hash: String,
}

/// The only fingerprint failure: input that is not decodable text. Malformed
/// HTML is never an error - the parser recovers a lenient tree.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("response body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// A parsed ad-container selector.
///
/// Class selectors use CSS class-token semantics (`.ad` matches
/// `class="ad banner"` but not `class="badge"`); the `[attr*='...']` forms
/// keep substring semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AdSelector {
    Class(String),
    Id(String),
    Tag(String),
    AttrContains { attr: String, needle: String },
}

impl AdSelector {
    fn parse(raw: &str) -> Option<AdSelector> {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix('.') {
            return Some(AdSelector::Class(name.to_string()));
        }
        if let Some(name) = raw.strip_prefix('#') {
            return Some(AdSelector::Id(name.to_string()));
        }
        if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let (attr, value) = inner.split_once("*=")?;
            let needle = value.trim().trim_matches(|c| c == '\'' || c == '"');
            if needle.is_empty() {
                return None;
            }
            return Some(AdSelector::AttrContains {
                attr: attr.trim().to_string(),
                needle: needle.to_string(),
            });
        }
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Some(AdSelector::Tag(raw.to_ascii_lowercase()));
        }
        None
    }

    fn matches(&self, element: &Element) -> bool {
        match self {
            AdSelector::Class(name) => element.classes().any(|class| class == name),
            AdSelector::Id(name) => element.id() == Some(name.as_str()),
            AdSelector::Tag(name) => element.name() == name,
            AdSelector::AttrContains { attr, needle } => element
                .attr(attr)
                .is_some_and(|value| value.contains(needle.as_str())),
        }
    }
}

/// Computes content and clean hashes for captured pages.
pub struct CleanHasher {
    strip_tags: HashSet<String>,
    extract_attrs: Vec<String>,
    ad_selectors: Vec<AdSelector>,
}

impl CleanHasher {
    pub fn new(settings: &HasherSettings) -> Self {
        let ad_selectors = settings
            .ad_selectors
            .iter()
            .filter_map(|raw| {
                let parsed = AdSelector::parse(raw);
                if parsed.is_none() {
                    warn!(selector = %raw, "ignoring unsupported ad selector");
                }
                parsed
            })
            .collect();

        Self {
            strip_tags: settings.strip_tags.iter().cloned().collect(),
            extract_attrs: settings.extract_attrs.clone(),
            ad_selectors,
        }
    }

    /// SHA-1 over the raw response bytes, before any normalization.
    pub fn content_hash(&self, raw: &[u8]) -> String {
        sha1_hex(raw)
    }

    /// The content-stability hash over the canonical feature stream.
    pub fn clean_hash(&self, html: &str) -> String {
        sha1_hex(self.feature_stream(html).as_bytes())
    }

    /// Both hashes in one call. The only failure is undecodable input.
    pub fn fingerprint(&self, raw: &[u8]) -> Result<Fingerprint, FingerprintError> {
        let html = std::str::from_utf8(raw)?;
        Ok(Fingerprint {
            content_hash: self.content_hash(raw),
            clean_hash: self.clean_hash(html),
        })
    }

    /// The serialized feature stream the clean hash is computed over: one
    /// record per surviving element in document order, tab-separated fields
    /// (tag, sorted `k=v` pairs for retained attributes, normalized direct
    /// text).
    fn feature_stream(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut out = String::new();
        self.walk(document.root_element(), &mut out);
        out
    }

    fn stripped(&self, element: &Element) -> bool {
        self.strip_tags.contains(element.name())
            || self.ad_selectors.iter().any(|s| s.matches(element))
    }

    fn walk(&self, el: ElementRef<'_>, out: &mut String) {
        let element = el.value();
        if self.stripped(element) {
            return;
        }

        out.push_str(element.name());
        out.push('\t');

        let mut attrs: Vec<(String, String)> = element
            .attrs()
            .filter(|(name, _)| self.extract_attrs.iter().any(|a| a == name))
            .map(|(name, value)| (name.to_string(), squash_whitespace(value)))
            .collect();
        attrs.sort();
        for (i, (name, value)) in attrs.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out.push('\t');

        let mut first = true;
        for child in el.children() {
            if let Node::Text(text) = child.value() {
                let normalized = squash_whitespace(text);
                if !normalized.is_empty() {
                    if !first {
                        out.push(' ');
                    }
                    out.push_str(&normalized);
                    first = false;
                }
            }
        }
        out.push('\n');

        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                self.walk(child_el, out);
            }
        }
    }

    /// The cleaned DOM used for the `dom.html` artifact: same noise removal
    /// as the hash, but all attributes preserved. Not part of the hash input.
    pub fn cleaned_dom(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut out = String::new();
        self.serialize(document.root_element(), &mut out);
        out
    }

    fn serialize(&self, el: ElementRef<'_>, out: &mut String) {
        let element = el.value();
        if self.stripped(element) {
            return;
        }

        let name = element.name();
        out.push('<');
        out.push_str(name);
        for (attr, value) in element.attrs() {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        for child in el.children() {
            match child.value() {
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.serialize(child_el, out);
                    }
                }
                _ => {}
            }
        }

        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HasherSettings;

    fn hasher() -> CleanHasher {
        CleanHasher::new(&HasherSettings::default())
    }

    #[test]
    fn sha1_matches_the_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn content_hash_is_sha1_hex() {
        let h = hasher();
        let hash = h.content_hash(b"<html><body>Hello World</body></html>");
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, h.content_hash(b"<html><body>Hello World</body></html>"));
    }

    #[test]
    fn clean_hash_is_deterministic() {
        let h = hasher();
        let html = "<html><body><p>Hello</p><a href='/x'>link</a></body></html>";
        assert_eq!(h.clean_hash(html), h.clean_hash(html));
        assert_eq!(h.clean_hash(html).len(), 40);
    }

    #[test]
    fn scripts_and_styles_do_not_affect_clean_hash() {
        let h = hasher();
        let plain = "<html><body>Hello</body></html>";
        let noisy = "<html><body>Hello<script>x=1</script><style>p{}</style>\
                     <noscript>no js</noscript></body></html>";

        assert_eq!(h.clean_hash(plain), h.clean_hash(noisy));
        assert_ne!(
            h.content_hash(plain.as_bytes()),
            h.content_hash(noisy.as_bytes())
        );
    }

    #[test]
    fn iframe_meta_link_svg_are_noise() {
        let h = hasher();
        let plain = "<html><head></head><body>Hello</body></html>";
        let noisy = "<html><head><meta charset='utf-8'><link rel='x' href='y'></head>\
                     <body>Hello<iframe src='z'></iframe><svg><rect/></svg></body></html>";

        assert_eq!(h.clean_hash(plain), h.clean_hash(noisy));
    }

    #[test]
    fn ad_containers_are_stripped() {
        let h = hasher();
        let plain = "<html><body><p>Hello</p></body></html>";
        let with_ads = "<html><body><p>Hello</p>\
                        <div class='ad'>buy</div>\
                        <div class='sponsored'>buy more</div>\
                        <div class='ad-banner wide'>banner</div>\
                        <div id='top-ad-slot'>slot</div></body></html>";

        assert_eq!(h.clean_hash(plain), h.clean_hash(with_ads));
    }

    #[test]
    fn class_selector_uses_token_semantics() {
        let h = hasher();
        // "badge" contains "ad" as a substring but is not the class token
        // "ad", so the element must survive.
        let plain = "<html><body><p>Hello</p></body></html>";
        let with_badge = "<html><body><p>Hello</p><span class='badge'>new</span></body></html>";

        assert_ne!(h.clean_hash(plain), h.clean_hash(with_badge));
    }

    #[test]
    fn retained_attributes_shape_the_hash() {
        let h = hasher();
        let a = "<html><body><a href='/one'>go</a></body></html>";
        let b = "<html><body><a href='/two'>go</a></body></html>";
        assert_ne!(h.clean_hash(a), h.clean_hash(b));
    }

    #[test]
    fn unretained_attributes_are_ignored() {
        let h = hasher();
        let a = "<html><body><p data-reactid='1'>Hello</p></body></html>";
        let b = "<html><body><p data-reactid='2'>Hello</p></body></html>";
        assert_eq!(h.clean_hash(a), h.clean_hash(b));
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let h = hasher();
        let a = "<html><body><img src='/i.png' alt='pic' title='t'></body></html>";
        let b = "<html><body><img title='t' alt='pic' src='/i.png'></body></html>";
        assert_eq!(h.clean_hash(a), h.clean_hash(b));
    }

    #[test]
    fn whitespace_runs_collapse() {
        let h = hasher();
        let a = "<html><body><p>Hello   world</p></body></html>";
        let b = "<html><body><p>  Hello\n\tworld </p></body></html>";
        assert_eq!(h.clean_hash(a), h.clean_hash(b));
    }

    #[test]
    fn document_order_matters() {
        let h = hasher();
        let a = "<html><body><p>one</p><p>two</p></body></html>";
        let b = "<html><body><p>two</p><p>one</p></body></html>";
        assert_ne!(h.clean_hash(a), h.clean_hash(b));
    }

    #[test]
    fn malformed_html_still_hashes() {
        let h = hasher();
        let hash = h.clean_hash("<div><p>unclosed<span>deep");
        assert_eq!(hash.len(), 40);
        assert_eq!(hash, h.clean_hash("<div><p>unclosed<span>deep"));
    }

    #[test]
    fn fingerprint_rejects_invalid_utf8() {
        let h = hasher();
        let err = h.fingerprint(&[0xff, 0xfe, 0x3c]).unwrap_err();
        assert!(matches!(err, FingerprintError::Encoding(_)));
    }

    #[test]
    fn fingerprint_pairs_both_hashes() {
        let h = hasher();
        let raw = b"<html><body>Hello</body></html>";
        let fp = h.fingerprint(raw).unwrap();
        assert_eq!(fp.content_hash, h.content_hash(raw));
        assert_eq!(fp.clean_hash, h.clean_hash("<html><body>Hello</body></html>"));
    }

    #[test]
    fn cleaned_dom_drops_noise_and_keeps_content() {
        let h = hasher();
        let dom = h.cleaned_dom(
            "<html><body><p class='intro'>Hello</p><script>x=1</script>\
             <div class='ad'>buy</div></body></html>",
        );

        assert!(dom.contains("<p class=\"intro\">Hello</p>"));
        assert!(!dom.contains("script"));
        assert!(!dom.contains("buy"));
    }

    #[test]
    fn cleaned_dom_escapes_text() {
        let h = hasher();
        let dom = h.cleaned_dom("<html><body><p>a &amp; b</p></body></html>");
        assert!(dom.contains("a &amp; b"));
    }

    #[test]
    fn unsupported_ad_selectors_are_skipped() {
        let settings = HasherSettings {
            ad_selectors: vec!["div > .ad".to_string(), ".promo".to_string()],
            ..HasherSettings::default()
        };
        let h = CleanHasher::new(&settings);

        let plain = "<html><body>Hello</body></html>";
        let promo = "<html><body>Hello<div class='promo'>x</div></body></html>";
        assert_eq!(h.clean_hash(plain), h.clean_hash(promo));
    }
}
