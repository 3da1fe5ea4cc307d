//! Deterministic overlapping text chunker.
//!
//! Pure function of (text, config): the same input always yields the same
//! chunk boundaries, which the vector store relies on for reproducible
//! indices.

use paperchat_common::{CharSpan, Chunk, PaperId};
use serde::{Deserialize, Serialize};

/// Configuration for the chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk. Must stay within the embedding
    /// backend's input budget.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Characters of overlap carried into the next chunk, so no sentence is
    /// orphaned at a boundary.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_max_chars() -> usize { 1000 }
fn default_overlap_chars() -> usize { 200 }

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_chars: default_max_chars(), overlap_chars: default_overlap_chars() }
    }
}

/// Split text into ordered, overlapping chunks.
///
/// Chunks break at word boundaries; each spans at most `max_chars` bytes and
/// consecutive chunks share up to `overlap_chars` of trailing text.
/// Whitespace-only input yields no chunks.
pub fn chunk_text(paper_id: PaperId, text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let spans = word_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }

    let max = config.max_chars.max(1);
    let overlap = config.overlap_chars.min(max.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut index = 0usize;
    let mut w = 0usize;

    while w < spans.len() {
        let (start, first_end) = spans[w];

        // A single word wider than the budget is hard-split so the chunk
        // bound holds for any input.
        if first_end - start > max {
            for (s, e) in split_long_word(text, start, first_end, max) {
                push_chunk(&mut chunks, paper_id, &mut index, text, s, e);
            }
            w += 1;
            continue;
        }

        let mut last = w;
        while last + 1 < spans.len() && spans[last + 1].1 - start <= max {
            last += 1;
        }
        let end = spans[last].1;
        push_chunk(&mut chunks, paper_id, &mut index, text, start, end);

        if last + 1 == spans.len() {
            break;
        }

        // Step back so the next chunk re-covers up to `overlap` trailing
        // characters; always advances by at least one word.
        let mut next = last + 1;
        for k in (w + 1)..=last {
            if end - spans[k].0 <= overlap {
                next = k;
                break;
            }
        }
        w = next;
    }

    chunks
}

fn push_chunk(
    chunks: &mut Vec<Chunk>,
    paper_id: PaperId,
    index: &mut usize,
    text: &str,
    start: usize,
    end: usize,
) {
    chunks.push(Chunk {
        paper_id,
        index: *index,
        text: text[start..end].to_string(),
        char_span: CharSpan { start, end },
    });
    *index += 1;
}

/// Byte spans of whitespace-separated words.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Split one overlong word into windows of at most `max` bytes, cutting only
/// at char boundaries.
fn split_long_word(text: &str, start: usize, end: usize, max: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut cur = start;
    while cur < end {
        let mut piece_end = (cur + max).min(end);
        while !text.is_char_boundary(piece_end) {
            piece_end -= 1;
        }
        if piece_end <= cur {
            // A single char wider than `max`; take it whole.
            piece_end = cur
                + text[cur..]
                    .chars()
                    .next()
                    .map(|c| c.len_utf8())
                    .unwrap_or(1);
        }
        pieces.push((cur, piece_end));
        cur = piece_end;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> PaperId {
        PaperId::from_url("https://example.org/chunker-test")
    }

    #[test]
    fn test_empty_and_whitespace_yield_no_chunks() {
        let cfg = ChunkerConfig::default();
        assert!(chunk_text(pid(), "", &cfg).is_empty());
        assert!(chunk_text(pid(), "   \n\t  ", &cfg).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let cfg = ChunkerConfig::default();
        let chunks = chunk_text(pid(), "a short paragraph of text", &cfg);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "a short paragraph of text");
        assert_eq!(chunks[0].char_span.start, 0);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let cfg = ChunkerConfig { max_chars: 80, overlap_chars: 20 };
        let text = "lorem ipsum dolor sit amet ".repeat(40);
        let a = chunk_text(pid(), &text, &cfg);
        let b = chunk_text(pid(), &text, &cfg);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.char_span, y.char_span);
            assert_eq!(x.text, y.text);
        }
    }

    #[test]
    fn test_chunks_respect_max_chars() {
        let cfg = ChunkerConfig { max_chars: 100, overlap_chars: 25 };
        let text = "word ".repeat(500);
        let chunks = chunk_text(pid(), &text, &cfg);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 100, "chunk of {} chars", c.text.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let cfg = ChunkerConfig { max_chars: 100, overlap_chars: 30 };
        let text = "alpha beta gamma delta ".repeat(50);
        let chunks = chunk_text(pid(), &text, &cfg);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(
                pair[1].char_span.start < pair[0].char_span.end,
                "chunks {} and {} do not overlap",
                pair[0].index,
                pair[1].index
            );
        }
    }

    #[test]
    fn test_indices_are_sequential() {
        let cfg = ChunkerConfig { max_chars: 60, overlap_chars: 10 };
        let text = "one two three four five six ".repeat(30);
        let chunks = chunk_text(pid(), &text, &cfg);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_spans_point_back_into_text() {
        let cfg = ChunkerConfig { max_chars: 70, overlap_chars: 15 };
        let text = "the quick brown fox jumps over the lazy dog ".repeat(20);
        for c in chunk_text(pid(), &text, &cfg) {
            assert_eq!(&text[c.char_span.start..c.char_span.end], c.text);
        }
    }

    #[test]
    fn test_overlong_word_is_hard_split() {
        let cfg = ChunkerConfig { max_chars: 10, overlap_chars: 2 };
        let text = "x".repeat(35);
        let chunks = chunk_text(pid(), &text, &cfg);
        assert_eq!(chunks.len(), 4);
        for c in &chunks {
            assert!(c.text.len() <= 10);
        }
        assert_eq!(chunks.last().unwrap().char_span.end, 35);
    }

    #[test]
    fn test_zero_overlap_still_advances() {
        let cfg = ChunkerConfig { max_chars: 50, overlap_chars: 0 };
        let text = "aa bb cc dd ee ff gg hh ii jj ".repeat(10);
        let chunks = chunk_text(pid(), &text, &cfg);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].char_span.start >= pair[0].char_span.end);
        }
    }
}
