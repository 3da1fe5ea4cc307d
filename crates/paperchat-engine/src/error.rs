//! Engine error taxonomy.
//!
//! Only failures with no safe fallback surface here; resolver and ingestion
//! problems are absorbed into degraded source types before they reach the
//! caller.

use paperchat_common::PaperId;
use paperchat_store::StoreError;
use thiserror::Error;

use crate::generate::LlmError;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Question asked before preparation completed; retry after `prepare`
    /// resolves.
    #[error("paper {0} is not ready; call prepare first")]
    NotReady(PaperId),

    /// Index build failure (embedding batch failed or timed out). Fatal for
    /// that build; the caller may retry preparation.
    #[error("index build failed: {0}")]
    Store(#[from] StoreError),

    /// Generation failed or timed out. Per-turn: the paper stays ready and
    /// the next question may still succeed.
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    /// Comparison precondition violation, rejected before any work starts.
    #[error("comparison requires at least two distinct papers, got {0}")]
    InsufficientPapers(usize),
}
