//! paperchat-common — Shared data model for the paper Q&A engine.

pub mod citation;
pub mod confidence;
pub mod models;

pub use models::{
    CharSpan, Chunk, Citation, ComparedPaper, ComparisonResult, ConversationTurn, Fingerprint,
    PaperId, PaperReference, PrepareOutcome, SourceRecord, SourceType,
};
