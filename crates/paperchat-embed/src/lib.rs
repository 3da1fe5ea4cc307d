//! paperchat-embed — Embedding backends.
//!
//! A narrow, swappable capability: text in, fixed-dimension vectors out.
//! Backends:
//!   OpenAiCompatibleEmbedder — any /v1/embeddings endpoint
//!   OllamaEmbedder           — local Ollama /api/embeddings
//!   HashingEmbedder          — deterministic offline token hashing
//!
//! All backends are order-preserving and fail the whole batch on any
//! per-text problem, so chunk-to-vector mappings can never go out of step.

pub mod backend;
pub mod config;
pub mod error;

pub use backend::{
    build_backend, l2_normalize, EmbeddingBackend, HashingEmbedder, OllamaEmbedder,
    OpenAiCompatibleEmbedder,
};
pub use config::{EmbeddingBackendKind, EmbeddingConfig};
pub use error::{EmbedError, Result};
