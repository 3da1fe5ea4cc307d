//! In-process doubles shared by the engine integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use paperchat_common::{PaperId, PaperReference, SourceRecord, SourceType};
use paperchat_embed::HashingEmbedder;
use paperchat_engine::{
    ChatEngine, EngineConfig, GenerationBackend, LlmError, LlmRequest, LlmResponse,
};
use paperchat_ingest::chunker::ChunkerConfig;
use paperchat_ingest::resolver::metadata_text;
use paperchat_ingest::SourceResolver;
use paperchat_store::{StoreConfig, VectorStoreManager};

/// Resolver with canned full-text records; anything unknown degrades the
/// way the HTTP resolver would.
pub struct StaticResolver {
    records: Mutex<HashMap<PaperId, SourceRecord>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self { records: Mutex::new(HashMap::new()) }
    }

    pub fn with_full_text(self, reference: &PaperReference, text: &str) -> Self {
        self.set_full_text(reference, text);
        self
    }

    pub fn set_full_text(&self, reference: &PaperReference, text: &str) {
        let paper_id = PaperId::from_reference(reference);
        let record =
            SourceRecord::new(paper_id, SourceType::FullTextPdfPrimary, Some(text.to_string()));
        self.records.lock().unwrap().insert(paper_id, record);
    }
}

#[async_trait]
impl SourceResolver for StaticResolver {
    async fn resolve(&self, reference: &PaperReference) -> SourceRecord {
        let paper_id = PaperId::from_reference(reference);
        if let Some(record) = self.records.lock().unwrap().get(&paper_id) {
            return record.clone();
        }
        if reference.abstract_text.as_deref().is_some_and(|a| !a.trim().is_empty()) {
            SourceRecord::new(paper_id, SourceType::MetadataOnly, Some(metadata_text(reference)))
        } else {
            SourceRecord::new(paper_id, SourceType::Unavailable, None)
        }
    }
}

/// Generation backend that answers with the user message it was given, so
/// assertions can see exactly what context reached the model.
pub struct EchoLlm;

#[async_trait]
impl GenerationBackend for EchoLlm {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let content = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(LlmResponse { content, model: "echo".to_string(), prompt_tokens: 0, completion_tokens: 0 })
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}

/// Fails the first N calls, then behaves like [`EchoLlm`].
pub struct FlakyLlm {
    failures_left: AtomicUsize,
}

impl FlakyLlm {
    pub fn new(failures: usize) -> Self {
        Self { failures_left: AtomicUsize::new(failures) }
    }
}

#[async_trait]
impl GenerationBackend for FlakyLlm {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LlmError::Unavailable("scripted failure".to_string()));
        }
        EchoLlm.complete(req).await
    }

    fn model_id(&self) -> &str {
        "flaky"
    }
}

pub fn engine_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.top_k = 4;
    cfg.store = StoreConfig {
        chunker: ChunkerConfig { max_chars: 200, overlap_chars: 40 },
        ..Default::default()
    };
    cfg
}

/// Engine wired with the hashing embedder; the store handle stays visible
/// for build-count assertions.
pub fn build_engine(
    resolver: Arc<dyn SourceResolver>,
    llm: Arc<dyn GenerationBackend>,
) -> (ChatEngine, Arc<VectorStoreManager>) {
    let cfg = engine_config();
    let store = Arc::new(VectorStoreManager::new(
        Arc::new(HashingEmbedder::new(128)),
        cfg.store.clone(),
    ));
    let engine = ChatEngine::new(resolver, Arc::clone(&store), llm, &cfg);
    (engine, store)
}
