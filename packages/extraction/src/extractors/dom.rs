//! Heuristic DOM extractor.
//!
//! The v1 extractor shipped with talemon: no network, no model calls, just a
//! structural read of the cleaned DOM. It produces a stable record with the
//! page title, the heading outline, resolved links, and a plain-text body:
//! enough for downstream search and diffing, and a worked example of the
//! [`Extractor`] contract for richer implementations.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::json;
use url::Url;

use crate::error::ExtractError;
use crate::traits::Extractor;
use crate::types::SnapshotDocument;

/// Maximum characters of body text carried into the record.
const MAX_TEXT_CHARS: usize = 4000;

/// Structural extractor over the cleaned DOM.
pub struct DomExtractor {
    version: String,
}

impl Default for DomExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DomExtractor {
    pub fn new() -> Self {
        Self {
            version: "dom-v1".to_string(),
        }
    }

    /// Use a custom version tag (forces re-extraction of the archive).
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    fn title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| normalize(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    fn headings(document: &Html) -> Vec<String> {
        let Ok(selector) = Selector::parse("h1, h2, h3") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .map(|el| normalize(&el.text().collect::<String>()))
            .filter(|h| !h.is_empty())
            .collect()
    }

    fn links(document: &Html, base: Option<&Url>) -> Vec<serde_json::Value> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                let resolved = match base {
                    Some(base) => base.join(href).map(String::from).unwrap_or_else(|_| href.to_string()),
                    None => href.to_string(),
                };
                let text = normalize(&el.text().collect::<String>());
                Some(json!({ "href": resolved, "text": text }))
            })
            .collect()
    }

    fn body_text(document: &Html) -> String {
        let text = normalize(&document.root_element().text().collect::<String>());
        if text.chars().count() <= MAX_TEXT_CHARS {
            return text;
        }
        text.chars().take(MAX_TEXT_CHARS).collect()
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Extractor for DomExtractor {
    fn version(&self) -> &str {
        &self.version
    }

    async fn extract(&self, doc: &SnapshotDocument) -> Result<serde_json::Value, ExtractError> {
        if !doc.has_content() {
            return Err(ExtractError::Document(format!(
                "empty snapshot document for {}",
                doc.url
            )));
        }

        let document = Html::parse_document(&doc.html);
        let base = Url::parse(&doc.url).ok();

        let text = Self::body_text(&document);
        let word_count = text.split_whitespace().count();

        Ok(json!({
            "url": doc.url,
            "captured_at": doc.captured_at,
            "title": Self::title(&document),
            "headings": Self::headings(&document),
            "links": Self::links(&document, base.as_ref()),
            "text": text,
            "word_count": word_count,
        }))
    }

    fn name(&self) -> &str {
        "dom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head><title>  Food   Shelf </title></head>
          <body>
            <h1>Hours</h1>
            <p>Open Monday through Friday.</p>
            <a href="/donate">Donate</a>
            <a href="https://other.example/about">About</a>
          </body>
        </html>
    "#;

    #[tokio::test]
    async fn extracts_title_headings_and_links() {
        let extractor = DomExtractor::new();
        let doc = SnapshotDocument::new("https://example.com/shelf", PAGE);

        let record = extractor.extract(&doc).await.unwrap();

        assert_eq!(record["title"], "Food Shelf");
        assert_eq!(record["headings"][0], "Hours");
        assert_eq!(record["links"][0]["href"], "https://example.com/donate");
        assert_eq!(record["links"][1]["href"], "https://other.example/about");
        assert!(record["word_count"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn body_text_is_whitespace_normalized() {
        let extractor = DomExtractor::new();
        let doc = SnapshotDocument::new(
            "https://example.com",
            "<html><body>  a\n\n   b\tc  </body></html>",
        );

        let record = extractor.extract(&doc).await.unwrap();

        assert_eq!(record["text"], "a b c");
        assert_eq!(record["word_count"], 3);
    }

    #[tokio::test]
    async fn rejects_empty_documents() {
        let extractor = DomExtractor::new();
        let doc = SnapshotDocument::new("https://example.com", "   ");

        let err = extractor.extract(&doc).await.unwrap_err();
        assert!(matches!(err, ExtractError::Document(_)));
    }

    #[tokio::test]
    async fn relative_links_survive_unresolvable_base() {
        let extractor = DomExtractor::new();
        let doc = SnapshotDocument::new("not a url", "<a href='/x'>x</a>");

        let record = extractor.extract(&doc).await.unwrap();
        assert_eq!(record["links"][0]["href"], "/x");
    }
}
