//! Data model shared across the engine crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A paper as supplied by the caller on every request.
///
/// Ephemeral: the engine never persists references, it only derives a
/// [`PaperId`] and a [`SourceRecord`] from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperReference {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u16>,
    pub abstract_text: Option<String>,
    /// Landing page or repository URL for the paper.
    pub source_url: Option<String>,
    /// Caller-supplied direct PDF link, tried before any URL rewriting.
    pub pdf_url: Option<String>,
}

/// Stable identifier for a paper, derived from its URL.
///
/// Same URL ⇒ same id, across process restarts. Distinct URLs get distinct
/// ids; no cross-source identity resolution is attempted (a publisher copy
/// and a preprint of the same paper are two papers to the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(Uuid);

impl PaperId {
    pub fn from_url(url: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, url.trim().as_bytes()))
    }

    /// Derive the id from the best available key: source URL, then direct
    /// PDF URL, then the title for references with no URL at all.
    pub fn from_reference(reference: &PaperReference) -> Self {
        let key = reference
            .source_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| reference.pdf_url.as_deref().filter(|u| !u.trim().is_empty()))
            .unwrap_or(&reference.title);
        Self::from_url(key)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a paper's grounding text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Full text extracted from the caller-supplied or rewritten PDF link.
    FullTextPdfPrimary,
    /// Full text found by sniffing the landing page for a PDF.
    FullTextPdfSecondary,
    /// Title + abstract only.
    MetadataOnly,
    /// No text and no abstract; answers come from general knowledge.
    Unavailable,
}

impl SourceType {
    pub fn is_full_text(&self) -> bool {
        matches!(self, SourceType::FullTextPdfPrimary | SourceType::FullTextPdfSecondary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::FullTextPdfPrimary   => "full_text_pdf_primary",
            SourceType::FullTextPdfSecondary => "full_text_pdf_secondary",
            SourceType::MetadataOnly         => "metadata_only",
            SourceType::Unavailable          => "unavailable",
        }
    }
}

/// SHA-256 hex digest of a paper's resolved text.
///
/// The vector store compares fingerprints to detect a re-submission of the
/// same paper id with different source content, which forces a fresh build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of source resolution for one paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub paper_id: PaperId,
    pub source_type: SourceType,
    /// Present unless the source is `Unavailable`.
    pub raw_text: Option<String>,
    pub fingerprint: Fingerprint,
    pub resolved_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn new(paper_id: PaperId, source_type: SourceType, raw_text: Option<String>) -> Self {
        let fingerprint = Fingerprint::of(raw_text.as_deref().unwrap_or(""));
        Self { paper_id, source_type, raw_text, fingerprint, resolved_at: Utc::now() }
    }
}

/// Byte offsets of a chunk within the resolved text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

/// A bounded, overlap-preserving slice of a paper's text; the unit of
/// retrieval. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub paper_id: PaperId,
    pub index: usize,
    pub text: String,
    pub char_span: CharSpan,
}

/// Which chunks backed an answer, plus a human-readable label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// "(Author et al., Year)" style label.
    pub label: String,
    /// Indices of the chunks that contributed context.
    pub chunk_indices: Vec<usize>,
}

/// One answered question. Stateless across turns; all turns for a paper
/// share the same vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub paper_id: PaperId,
    pub question: String,
    pub retrieved_chunks: Vec<Chunk>,
    pub answer: String,
    pub citation: Option<Citation>,
    /// 0–100 score; see [`crate::confidence`].
    pub confidence: Option<u8>,
    pub disclaimer: Option<String>,
}

/// Result of `prepare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareOutcome {
    pub paper_id: PaperId,
    pub source_type: SourceType,
    pub ready: bool,
}

/// A paper that took part in a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparedPaper {
    pub paper_id: PaperId,
    pub title: String,
    pub citation: String,
    pub source_type: SourceType,
}

/// Single synthesized comparison across two or more papers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub synthesis_text: String,
    pub papers: Vec<ComparedPaper>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(url: &str) -> PaperReference {
        PaperReference {
            title: "Attention Is All You Need".to_string(),
            source_url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_paper_id_is_stable() {
        let a = PaperId::from_url("https://arxiv.org/abs/1706.03762");
        let b = PaperId::from_url("https://arxiv.org/abs/1706.03762");
        assert_eq!(a, b);
    }

    #[test]
    fn test_paper_id_ignores_surrounding_whitespace() {
        let a = PaperId::from_url("https://arxiv.org/abs/1706.03762");
        let b = PaperId::from_url("  https://arxiv.org/abs/1706.03762 ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_urls_get_distinct_ids() {
        let a = PaperId::from_url("https://arxiv.org/abs/1706.03762");
        let b = PaperId::from_url("https://arxiv.org/abs/1810.04805");
        assert_ne!(a, b);
    }

    #[test]
    fn test_reference_without_url_falls_back_to_title() {
        let mut r = reference("");
        r.source_url = None;
        let a = PaperId::from_reference(&r);
        let b = PaperId::from_reference(&r);
        assert_eq!(a, b);
        assert_eq!(a, PaperId::from_url("Attention Is All You Need"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Fingerprint::of("some text");
        let b = Fingerprint::of("some text");
        let c = Fingerprint::of("other text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_source_record_fingerprints_empty_when_unavailable() {
        let id = PaperId::from_url("https://example.org/p");
        let r = SourceRecord::new(id, SourceType::Unavailable, None);
        assert_eq!(r.fingerprint, Fingerprint::of(""));
        assert!(r.raw_text.is_none());
    }
}
