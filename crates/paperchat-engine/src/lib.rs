//! paperchat-engine — Conversational Q&A over papers.
//!
//! Ties source resolution, the vector store, and a generation backend into
//! the per-paper state machine (`unprepared → preparing → ready |
//! ready(degraded)`) plus the multi-paper comparison built on top of it.

pub mod answer;
pub mod compare;
pub mod config;
pub mod error;
pub mod generate;
pub mod prompt;

pub use answer::{ChatEngine, PaperStatus};
pub use config::{EngineConfig, GenerationBackendKind, GenerationConfig};
pub use error::ChatError;
pub use generate::{GenerationBackend, LlmError, LlmRequest, LlmResponse, Message};
