//! Source resolution: find the best retrievable full text for a paper, or
//! fall back to metadata-only grounding.
//!
//! Resolution never fails: every outcome is a [`SourceRecord`] whose
//! `source_type` tells downstream components how much grounding they have.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use paperchat_common::{PaperId, PaperReference, SourceRecord, SourceType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::pdf;

/// Configuration for the HTTP resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Download attempts per candidate URL.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Extracted text shorter than this is treated as a failed extraction.
    #[serde(default = "default_min_full_text_chars")]
    pub min_full_text_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_secs() -> u64 { 30 }
fn default_max_attempts() -> usize { 3 }
fn default_min_full_text_chars() -> usize { 500 }
fn default_user_agent() -> String { "paperchat/0.1 (research)".to_string() }

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_attempts: default_max_attempts(),
            min_full_text_chars: default_min_full_text_chars(),
            user_agent: default_user_agent(),
        }
    }
}

/// Resolves a paper reference to its grounding text.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, reference: &PaperReference) -> SourceRecord;
}

/// Production resolver: downloads candidate PDFs over HTTP.
pub struct HttpResolver {
    client: reqwest::Client,
    cfg: ResolverConfig,
}

impl HttpResolver {
    pub fn new(cfg: ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self { client, cfg })
    }

    /// Candidate URLs in priority order: caller-supplied PDF link, then a
    /// rewritten repository link, then the landing page itself (sniffed).
    fn candidates(&self, reference: &PaperReference) -> Vec<(String, SourceType)> {
        fn push(out: &mut Vec<(String, SourceType)>, url: String, source_type: SourceType) {
            if !url.trim().is_empty() && !out.iter().any(|(u, _)| u == &url) {
                out.push((url, source_type));
            }
        }

        let mut out = Vec::new();
        if let Some(pdf_url) = reference.pdf_url.as_deref() {
            push(&mut out, pdf_url.trim().to_string(), SourceType::FullTextPdfPrimary);
        }
        if let Some(source_url) = reference.source_url.as_deref() {
            if let Some(rewritten) = rewrite_pdf_url(source_url) {
                push(&mut out, rewritten, SourceType::FullTextPdfPrimary);
            }
            push(&mut out, source_url.trim().to_string(), SourceType::FullTextPdfSecondary);
        }
        out
    }

    /// Download one candidate. `Ok(None)` means the URL answered but did not
    /// serve a PDF; errors are retried up to `max_attempts`.
    async fn fetch_pdf(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let mut last_err = None;
        for attempt in 0..self.cfg.max_attempts {
            let resp = match self.client.get(url).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(url, attempt, error = %e, "pdf request failed");
                    last_err = Some(e.into());
                    continue;
                }
            };

            let status = resp.status();
            if status.as_u16() == 202 {
                // Some repositories prepare PDFs lazily; wait and retry.
                tokio::time::sleep(Duration::from_secs(2 * (attempt as u64 + 1))).await;
                continue;
            }
            if status.as_u16() == 404 {
                return Ok(None);
            }
            if !status.is_success() {
                debug!(url, status = status.as_u16(), "unexpected status for pdf candidate");
                return Ok(None);
            }

            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_ascii_lowercase();
            let bytes = resp.bytes().await?;

            if content_type.contains("pdf")
                || url.to_ascii_lowercase().ends_with(".pdf")
                || pdf::is_pdf_bytes(&bytes)
            {
                return Ok(Some(bytes.to_vec()));
            }
            debug!(url, content_type, "candidate returned non-pdf content");
            return Ok(None);
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("pdf download attempts exhausted")))
    }

    async fn try_full_text(&self, url: &str) -> Option<String> {
        let bytes = match self.fetch_pdf(url).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                debug!(url, error = %e, "pdf fetch failed");
                return None;
            }
        };

        let parsed = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&bytes)).await;
        match parsed {
            Ok(Ok(text)) if text.len() >= self.cfg.min_full_text_chars => Some(text),
            Ok(Ok(text)) => {
                debug!(url, chars = text.len(), "extracted text too short, discarding");
                None
            }
            Ok(Err(e)) => {
                debug!(url, error = %e, "pdf parse failed");
                None
            }
            Err(e) => {
                debug!(url, error = %e, "pdf parse task failed");
                None
            }
        }
    }
}

#[async_trait]
impl SourceResolver for HttpResolver {
    #[instrument(skip(self, reference), fields(title = %reference.title))]
    async fn resolve(&self, reference: &PaperReference) -> SourceRecord {
        let paper_id = PaperId::from_reference(reference);

        for (url, source_type) in self.candidates(reference) {
            if let Some(text) = self.try_full_text(&url).await {
                info!(
                    paper_id = %paper_id,
                    source_type = source_type.as_str(),
                    chars = text.len(),
                    "full text resolved"
                );
                return SourceRecord::new(paper_id, source_type, Some(text));
            }
        }

        // No full text anywhere: ground on title + abstract when we have one.
        if reference.abstract_text.as_deref().is_some_and(|a| !a.trim().is_empty()) {
            info!(paper_id = %paper_id, "falling back to metadata-only grounding");
            return SourceRecord::new(
                paper_id,
                SourceType::MetadataOnly,
                Some(metadata_text(reference)),
            );
        }

        info!(paper_id = %paper_id, "no source material available");
        SourceRecord::new(paper_id, SourceType::Unavailable, None)
    }
}

/// Compose the metadata-only grounding text from a reference.
pub fn metadata_text(reference: &PaperReference) -> String {
    let mut text = format!("Title: {}", reference.title.trim());
    if let Some(abstract_text) = reference.abstract_text.as_deref() {
        text.push_str("\n\nAbstract: ");
        text.push_str(abstract_text.trim());
    }
    if !reference.authors.is_empty() {
        text.push_str("\n\nAuthors: ");
        text.push_str(&reference.authors.join(", "));
    }
    if let Some(year) = reference.year {
        text.push_str("\n\nYear: ");
        text.push_str(&year.to_string());
    }
    text
}

lazy_static! {
    static ref ARXIV_ABS: Regex = Regex::new(r"arxiv\.org/abs/([^?#]+)").unwrap();
}

/// Rewrite well-known landing-page URLs to direct PDF links.
///
/// Handles already-direct `.pdf` links, arXiv abstract pages, bare arXiv
/// `/pdf/` links, and OpenReview forum pages. Returns `None` for anything
/// it does not recognize.
pub fn rewrite_pdf_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.to_ascii_lowercase().ends_with(".pdf") {
        return Some(trimmed.to_string());
    }
    if let Some(caps) = ARXIV_ABS.captures(trimmed) {
        return Some(format!("https://arxiv.org/pdf/{}.pdf", &caps[1]));
    }
    if trimmed.contains("arxiv.org/pdf/") {
        return Some(format!("{trimmed}.pdf"));
    }
    if trimmed.contains("openreview.net/forum") {
        if let Ok(parsed) = Url::parse(trimmed) {
            if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "id") {
                return Some(format!("https://openreview.net/pdf?id={id}"));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_pdf_passes_through() {
        assert_eq!(
            rewrite_pdf_url("https://proceedings.mlr.press/v97/p.pdf").as_deref(),
            Some("https://proceedings.mlr.press/v97/p.pdf")
        );
    }

    #[test]
    fn test_arxiv_abs_rewrites_to_pdf() {
        assert_eq!(
            rewrite_pdf_url("https://arxiv.org/abs/1706.03762").as_deref(),
            Some("https://arxiv.org/pdf/1706.03762.pdf")
        );
    }

    #[test]
    fn test_arxiv_abs_strips_fragment() {
        assert_eq!(
            rewrite_pdf_url("https://arxiv.org/abs/1706.03762#section").as_deref(),
            Some("https://arxiv.org/pdf/1706.03762.pdf")
        );
    }

    #[test]
    fn test_bare_arxiv_pdf_gains_extension() {
        assert_eq!(
            rewrite_pdf_url("https://arxiv.org/pdf/1706.03762").as_deref(),
            Some("https://arxiv.org/pdf/1706.03762.pdf")
        );
    }

    #[test]
    fn test_openreview_forum_rewrites() {
        assert_eq!(
            rewrite_pdf_url("https://openreview.net/forum?id=abc123").as_deref(),
            Some("https://openreview.net/pdf?id=abc123")
        );
    }

    #[test]
    fn test_unknown_urls_are_not_rewritten() {
        assert_eq!(rewrite_pdf_url("https://dl.acm.org/doi/10.1145/123"), None);
        assert_eq!(rewrite_pdf_url(""), None);
    }

    #[test]
    fn test_metadata_text_includes_fields() {
        let r = PaperReference {
            title: "A Study".to_string(),
            authors: vec!["A One".to_string(), "B Two".to_string()],
            year: Some(2021),
            abstract_text: Some("Studies X.".to_string()),
            ..Default::default()
        };
        let text = metadata_text(&r);
        assert!(text.contains("Title: A Study"));
        assert!(text.contains("Abstract: Studies X."));
        assert!(text.contains("Authors: A One, B Two"));
        assert!(text.contains("Year: 2021"));
    }

    #[test]
    fn test_candidates_prefer_direct_pdf_and_dedup() {
        let resolver = HttpResolver::new(ResolverConfig::default()).unwrap();
        let r = PaperReference {
            title: "T".to_string(),
            source_url: Some("https://arxiv.org/abs/1706.03762".to_string()),
            pdf_url: Some("https://arxiv.org/pdf/1706.03762.pdf".to_string()),
            ..Default::default()
        };
        let candidates = resolver.candidates(&r);
        // The rewritten abs link collides with the supplied pdf link.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].0, "https://arxiv.org/pdf/1706.03762.pdf");
        assert_eq!(candidates[0].1, SourceType::FullTextPdfPrimary);
        assert_eq!(candidates[1].1, SourceType::FullTextPdfSecondary);
    }

    #[tokio::test]
    async fn test_unreachable_url_degrades_to_metadata() {
        let resolver = HttpResolver::new(ResolverConfig {
            fetch_timeout_secs: 2,
            max_attempts: 1,
            ..Default::default()
        })
        .unwrap();
        let r = PaperReference {
            title: "A".to_string(),
            abstract_text: Some("Studies X.".to_string()),
            // Discard port: connection is refused immediately.
            source_url: Some("http://127.0.0.1:9/a.pdf".to_string()),
            ..Default::default()
        };
        let record = resolver.resolve(&r).await;
        assert_eq!(record.source_type, SourceType::MetadataOnly);
        assert!(record.raw_text.as_deref().unwrap().contains("Studies X."));
    }

    #[tokio::test]
    async fn test_no_url_no_abstract_is_unavailable() {
        let resolver = HttpResolver::new(ResolverConfig::default()).unwrap();
        let r = PaperReference { title: "T".to_string(), ..Default::default() };
        let record = resolver.resolve(&r).await;
        assert_eq!(record.source_type, SourceType::Unavailable);
        assert!(record.raw_text.is_none());
    }
}
