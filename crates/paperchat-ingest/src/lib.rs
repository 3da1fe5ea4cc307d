//! paperchat-ingest — Source resolution and document ingestion.
//!
//! - PDF source resolution with fallback to metadata-only grounding
//! - PDF text extraction
//! - Deterministic overlapping chunking

pub mod chunker;
pub mod pdf;
pub mod resolver;

pub use chunker::{chunk_text, ChunkerConfig};
pub use resolver::{HttpResolver, ResolverConfig, SourceResolver};
