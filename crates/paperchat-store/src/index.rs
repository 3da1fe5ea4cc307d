//! In-memory vector index for one paper.

use paperchat_common::{CharSpan, Chunk, Fingerprint, PaperId};

/// A chunk returned from retrieval, with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The embedded chunks of one paper, or a degenerate stand-in when no full
/// text was available. Immutable once built; invalidation means building a
/// new index.
#[derive(Debug)]
pub struct VectorIndex {
    paper_id: PaperId,
    fingerprint: Fingerprint,
    kind: IndexKind,
}

#[derive(Debug)]
enum IndexKind {
    /// Embedded full-text chunks; `vectors[i]` belongs to `chunks[i]` and is
    /// L2-normalized.
    Full { chunks: Vec<Chunk>, vectors: Vec<Vec<f32>> },
    /// Single synthetic title+abstract chunk; queries return it regardless
    /// of `top_k` and no embedding is involved.
    Degenerate { chunk: Chunk },
    /// Nothing to retrieve from (unavailable source).
    Empty,
}

impl VectorIndex {
    pub fn full(
        paper_id: PaperId,
        fingerprint: Fingerprint,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Self {
        debug_assert_eq!(chunks.len(), vectors.len());
        Self { paper_id, fingerprint, kind: IndexKind::Full { chunks, vectors } }
    }

    pub fn degenerate(paper_id: PaperId, fingerprint: Fingerprint, text: String) -> Self {
        let span = CharSpan { start: 0, end: text.len() };
        let chunk = Chunk { paper_id, index: 0, text, char_span: span };
        Self { paper_id, fingerprint, kind: IndexKind::Degenerate { chunk } }
    }

    pub fn empty(paper_id: PaperId, fingerprint: Fingerprint) -> Self {
        Self { paper_id, fingerprint, kind: IndexKind::Empty }
    }

    pub fn paper_id(&self) -> PaperId {
        self.paper_id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Number of retrievable chunks.
    pub fn chunk_count(&self) -> usize {
        match &self.kind {
            IndexKind::Full { chunks, .. } => chunks.len(),
            IndexKind::Degenerate { .. } => 1,
            IndexKind::Empty => 0,
        }
    }

    /// True when queries need a question embedding.
    pub fn needs_query_vector(&self) -> bool {
        matches!(self.kind, IndexKind::Full { .. })
    }

    /// True when this index grounds on less than the paper's full text.
    pub fn is_degraded(&self) -> bool {
        !matches!(self.kind, IndexKind::Full { .. })
    }

    /// Rank chunks by cosine similarity to the (normalized) query vector,
    /// highest first; ties break toward the earlier chunk for determinism.
    pub fn search(&self, query_vector: Option<&[f32]>, top_k: usize) -> Vec<RetrievedChunk> {
        match &self.kind {
            IndexKind::Empty => Vec::new(),
            IndexKind::Degenerate { chunk } => {
                vec![RetrievedChunk { chunk: chunk.clone(), score: 1.0 }]
            }
            IndexKind::Full { chunks, vectors } => {
                let Some(query) = query_vector else {
                    return Vec::new();
                };
                let mut scored: Vec<(f32, usize)> = vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (dot(query, v), i))
                    .collect();
                scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
                scored
                    .into_iter()
                    .take(top_k)
                    .map(|(score, i)| RetrievedChunk { chunk: chunks[i].clone(), score })
                    .collect()
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> PaperId {
        PaperId::from_url("https://example.org/index-test")
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            paper_id: pid(),
            index,
            text: text.to_string(),
            char_span: CharSpan { start: 0, end: text.len() },
        }
    }

    #[test]
    fn test_full_index_ranks_by_similarity() {
        let idx = VectorIndex::full(
            pid(),
            Fingerprint::of("t"),
            vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        );
        let hits = idx.search(Some(&[1.0, 0.0]), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.index, 0);
        assert_eq!(hits[1].chunk.index, 2);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_ties_break_toward_earlier_chunk() {
        let idx = VectorIndex::full(
            pid(),
            Fingerprint::of("t"),
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
        );
        let hits = idx.search(Some(&[1.0, 0.0]), 2);
        assert_eq!(hits[0].chunk.index, 0);
        assert_eq!(hits[1].chunk.index, 1);
    }

    #[test]
    fn test_degenerate_ignores_top_k() {
        let idx = VectorIndex::degenerate(pid(), Fingerprint::of("m"), "Title: T".to_string());
        assert_eq!(idx.search(None, 10).len(), 1);
        assert_eq!(idx.search(Some(&[1.0]), 0).len(), 1);
        assert!(idx.is_degraded());
        assert!(!idx.needs_query_vector());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let idx = VectorIndex::empty(pid(), Fingerprint::of(""));
        assert!(idx.search(Some(&[1.0]), 5).is_empty());
        assert_eq!(idx.chunk_count(), 0);
    }
}
