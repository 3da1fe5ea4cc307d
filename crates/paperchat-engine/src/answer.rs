//! Per-paper conversation engine.
//!
//! State machine per paper: `unprepared → preparing → ready |
//! ready(degraded)`. Once ready, a paper takes unlimited question turns
//! against the same vector index; turns themselves are stateless.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use paperchat_common::{
    citation, confidence, Citation, ConversationTurn, PaperId, PaperReference, PrepareOutcome,
    SourceRecord, SourceType,
};
use paperchat_ingest::{HttpResolver, SourceResolver};
use paperchat_store::VectorStoreManager;
use tracing::{info, instrument, warn};

use crate::config::{EngineConfig, GenerationConfig};
use crate::error::ChatError;
use crate::generate::{self, GenerationBackend, LlmError, LlmRequest, LlmResponse, Message};
use crate::prompt;

/// Externally visible preparation state of one paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperStatus {
    Unprepared,
    Preparing,
    Ready,
    ReadyDegraded,
}

pub(crate) struct PaperSession {
    pub(crate) reference: PaperReference,
    pub(crate) record: SourceRecord,
}

enum SessionState {
    Preparing,
    Ready(Arc<PaperSession>),
}

/// Conversational Q&A engine over prepared papers.
pub struct ChatEngine {
    pub(crate) resolver: Arc<dyn SourceResolver>,
    pub(crate) store: Arc<VectorStoreManager>,
    pub(crate) llm: Arc<dyn GenerationBackend>,
    pub(crate) top_k: usize,
    pub(crate) generation_timeout: Duration,
    pub(crate) generation_cfg: GenerationConfig,
    sessions: Mutex<HashMap<PaperId, SessionState>>,
}

impl ChatEngine {
    /// Wire an engine from parts. Tests inject their own resolver and
    /// generation backend here.
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        store: Arc<VectorStoreManager>,
        llm: Arc<dyn GenerationBackend>,
        cfg: &EngineConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            llm,
            top_k: cfg.top_k,
            generation_timeout: cfg.generation_timeout(),
            generation_cfg: cfg.generation.clone(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Build the production engine: HTTP resolver, configured embedding
    /// backend behind the store manager, configured generation backend.
    pub fn from_config(cfg: EngineConfig) -> anyhow::Result<Self> {
        let resolver = Arc::new(HttpResolver::new(cfg.resolver.clone())?);
        let embedder = paperchat_embed::build_backend(&cfg.embedding);
        let store = Arc::new(VectorStoreManager::new(embedder, cfg.store.clone()));
        let llm = generate::build_backend(&cfg.generation);
        Ok(Self::new(resolver, store, llm, &cfg))
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<PaperId, SessionState>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn session(&self, paper_id: PaperId) -> Option<Arc<PaperSession>> {
        match self.sessions().get(&paper_id) {
            Some(SessionState::Ready(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Current state of a paper.
    pub fn status(&self, paper_id: PaperId) -> PaperStatus {
        match self.sessions().get(&paper_id) {
            None => PaperStatus::Unprepared,
            Some(SessionState::Preparing) => PaperStatus::Preparing,
            Some(SessionState::Ready(session)) => {
                if session.record.source_type.is_full_text() {
                    PaperStatus::Ready
                } else {
                    PaperStatus::ReadyDegraded
                }
            }
        }
    }

    /// Make a paper queryable. Idempotent: a ready paper is never
    /// re-resolved and its index is served from cache (rebuilt only after
    /// eviction, from the retained record).
    #[instrument(skip(self, reference), fields(title = %reference.title))]
    pub async fn prepare(&self, reference: &PaperReference) -> Result<PrepareOutcome, ChatError> {
        let paper_id = PaperId::from_reference(reference);

        if let Some(session) = self.session(paper_id) {
            self.store.ensure_index(&session.record).await?;
            return Ok(PrepareOutcome {
                paper_id,
                source_type: session.record.source_type,
                ready: true,
            });
        }

        self.sessions().entry(paper_id).or_insert(SessionState::Preparing);
        self.resolve_and_build(paper_id, reference).await
    }

    /// Re-resolve a paper the caller believes has changed. A different
    /// fingerprint makes the store build a fresh index; an unchanged one is
    /// a no-op beyond the resolution itself.
    #[instrument(skip(self, reference), fields(title = %reference.title))]
    pub async fn refresh(&self, reference: &PaperReference) -> Result<PrepareOutcome, ChatError> {
        let paper_id = PaperId::from_reference(reference);
        self.sessions().insert(paper_id, SessionState::Preparing);
        self.resolve_and_build(paper_id, reference).await
    }

    async fn resolve_and_build(
        &self,
        paper_id: PaperId,
        reference: &PaperReference,
    ) -> Result<PrepareOutcome, ChatError> {
        let record = self.resolver.resolve(reference).await;
        let source_type = record.source_type;

        match self.store.ensure_index(&record).await {
            Ok(_) => {
                info!(
                    paper_id = %paper_id,
                    source_type = source_type.as_str(),
                    "paper prepared"
                );
                self.sessions().insert(
                    paper_id,
                    SessionState::Ready(Arc::new(PaperSession {
                        reference: reference.clone(),
                        record,
                    })),
                );
                Ok(PrepareOutcome { paper_id, source_type, ready: true })
            }
            Err(e) => {
                // Back to unprepared so the caller can retry, unless a
                // concurrent prepare already succeeded.
                let mut sessions = self.sessions();
                if matches!(sessions.get(&paper_id), Some(SessionState::Preparing)) {
                    sessions.remove(&paper_id);
                }
                Err(e.into())
            }
        }
    }

    /// Answer one question about a prepared paper.
    ///
    /// Fails with `NotReady` before preparation completes. A generation
    /// failure is terminal for this turn only; the paper stays ready.
    #[instrument(skip(self, question), fields(paper_id = %paper_id))]
    pub async fn ask(
        &self,
        paper_id: PaperId,
        question: &str,
    ) -> Result<ConversationTurn, ChatError> {
        let Some(session) = self.session(paper_id) else {
            return Err(ChatError::NotReady(paper_id));
        };
        let record = &session.record;

        // Served from cache; transparently rebuilt if evicted.
        let index = self.store.ensure_index(record).await?;
        let retrieved = self.store.query(&index, question, self.top_k).await?;

        let citation_label = citation::citation_label(&session.reference);
        let context = retrieved
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = match record.source_type {
            SourceType::FullTextPdfPrimary | SourceType::FullTextPdfSecondary => {
                prompt::grounded_messages(&citation_label, &context, question)
            }
            SourceType::MetadataOnly => {
                prompt::metadata_messages(&citation_label, &context, question)
            }
            SourceType::Unavailable => {
                prompt::general_knowledge_messages(&session.reference.title, question)
            }
        };

        let response = self.generate(messages).await?;

        let citation = (record.source_type.is_full_text() && !retrieved.is_empty()).then(|| {
            Citation {
                label: citation_label,
                chunk_indices: retrieved.iter().map(|r| r.chunk.index).collect(),
            }
        });
        let disclaimer = match record.source_type {
            SourceType::MetadataOnly => Some("limited data available".to_string()),
            SourceType::Unavailable => Some(
                "no source material was available; answered from general knowledge".to_string(),
            ),
            _ => None,
        };
        let score = confidence::score_answer(
            record.source_type,
            &confidence::ConfidenceInputs {
                retrieval_scores: retrieved.iter().map(|r| r.score).collect(),
                answer_chars: response.content.len(),
                question_chars: question.len(),
                chunks_used: retrieved.len(),
            },
        );

        Ok(ConversationTurn {
            paper_id,
            question: question.to_string(),
            retrieved_chunks: retrieved.into_iter().map(|r| r.chunk).collect(),
            answer: response.content,
            citation,
            confidence: Some(score),
            disclaimer,
        })
    }

    pub(crate) async fn generate(
        &self,
        messages: Vec<Message>,
    ) -> Result<LlmResponse, ChatError> {
        let req = LlmRequest {
            messages,
            max_tokens: Some(self.generation_cfg.max_tokens),
            temperature: Some(self.generation_cfg.temperature),
        };
        let result = tokio::time::timeout(self.generation_timeout, self.llm.complete(req)).await;
        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                warn!(error = %e, "generation call failed");
                Err(ChatError::Generation(e))
            }
            Err(_) => Err(ChatError::Generation(LlmError::Timeout(
                self.generation_timeout.as_secs(),
            ))),
        }
    }
}
