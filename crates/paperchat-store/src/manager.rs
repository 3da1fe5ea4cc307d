//! Vector store manager: owns the `PaperId → VectorIndex` mapping.
//!
//! Guarantees:
//!   - at most one build per paper runs at a time; concurrent callers for
//!     the same unbuilt paper attach to the in-flight build and share its
//!     result
//!   - builds for different papers never block each other
//!   - eviction (least-recently-queried first) is invisible to callers;
//!     the next `ensure_index` rebuilds from the caller's record

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use paperchat_common::{PaperId, SourceRecord, SourceType};
use paperchat_embed::{l2_normalize, EmbedError, EmbeddingBackend};
use paperchat_ingest::chunker::{chunk_text, ChunkerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::index::{RetrievedChunk, VectorIndex};

/// Configuration for the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bound on resident indices; least-recently-queried beyond this are
    /// dropped and rebuilt on next access.
    #[serde(default = "default_max_resident_indices")]
    pub max_resident_indices: usize,
    /// Chunks embedded per backend call.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    /// Timeout for one embedding call, in seconds.
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    #[serde(default)]
    pub chunker: ChunkerConfig,
}

fn default_max_resident_indices() -> usize { 64 }
fn default_embed_batch_size() -> usize { 32 }
fn default_embed_timeout_secs() -> u64 { 120 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_resident_indices: default_max_resident_indices(),
            embed_batch_size: default_embed_batch_size(),
            embed_timeout_secs: default_embed_timeout_secs(),
            chunker: ChunkerConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("embedding timed out after {0}s")]
    EmbeddingTimeout(u64),

    #[error("index build failed: {0}")]
    BuildFailed(String),
}

type BuildOutcome = Result<Arc<VectorIndex>, String>;
type BuildTx = watch::Sender<Option<BuildOutcome>>;
type BuildRx = watch::Receiver<Option<BuildOutcome>>;

enum Decision {
    Ready(Arc<VectorIndex>),
    Join(BuildRx),
    Claim(BuildTx),
}

struct State {
    resident: LruCache<PaperId, Arc<VectorIndex>>,
    in_flight: HashMap<PaperId, BuildRx>,
}

/// Exclusive owner of all vector indices.
pub struct VectorStoreManager {
    embedder: Arc<dyn EmbeddingBackend>,
    cfg: StoreConfig,
    state: Mutex<State>,
    builds: AtomicU64,
}

impl VectorStoreManager {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, cfg: StoreConfig) -> Self {
        let capacity =
            NonZeroUsize::new(cfg.max_resident_indices).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedder,
            cfg,
            state: Mutex::new(State {
                resident: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
            builds: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of embedding builds started. Instrumentation for the
    /// idempotence and coalescing guarantees.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of indices currently resident.
    pub fn resident_count(&self) -> usize {
        self.state().resident.len()
    }

    /// Return the index for this record, building it if needed.
    ///
    /// A resident index whose fingerprint matches the record is returned
    /// as-is. A fingerprint mismatch (same paper id, different content)
    /// discards the old index and builds fresh. Concurrent calls for the
    /// same paper share one build.
    pub async fn ensure_index(
        &self,
        record: &SourceRecord,
    ) -> Result<Arc<VectorIndex>, StoreError> {
        let paper_id = record.paper_id;
        loop {
            let decision = {
                let mut state = self.state();
                let cached = state.resident.get(&paper_id).map(Arc::clone);
                match cached {
                    Some(idx) if idx.fingerprint() == &record.fingerprint => Decision::Ready(idx),
                    Some(_) => {
                        debug!(paper_id = %paper_id, "source content changed, discarding index");
                        state.resident.pop(&paper_id);
                        join_or_claim(&mut state, paper_id)
                    }
                    None => join_or_claim(&mut state, paper_id),
                }
            };

            match decision {
                Decision::Ready(idx) => return Ok(idx),

                Decision::Join(mut rx) => loop {
                    let outcome = rx.borrow().clone();
                    match outcome {
                        Some(Ok(idx)) => {
                            if idx.fingerprint() == &record.fingerprint {
                                return Ok(idx);
                            }
                            // Built from different content; take another pass.
                            break;
                        }
                        Some(Err(message)) => return Err(StoreError::BuildFailed(message)),
                        None => {
                            if rx.changed().await.is_err() {
                                break;
                            }
                        }
                    }
                },

                Decision::Claim(tx) => {
                    let outcome = self.build(record).await;
                    let mut state = self.state();
                    state.in_flight.remove(&paper_id);
                    match outcome {
                        Ok(idx) => {
                            state.resident.put(paper_id, Arc::clone(&idx));
                            drop(state);
                            let _ = tx.send(Some(Ok(Arc::clone(&idx))));
                            return Ok(idx);
                        }
                        Err(e) => {
                            drop(state);
                            let _ = tx.send(Some(Err(e.to_string())));
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Retrieve the chunks most similar to the question, highest first.
    ///
    /// Degenerate indices answer without embedding the question; querying
    /// refreshes the paper's recency for the eviction policy.
    pub async fn query(
        &self,
        index: &VectorIndex,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        {
            let mut state = self.state();
            let _ = state.resident.get(&index.paper_id());
        }

        if !index.needs_query_vector() {
            return Ok(index.search(None, top_k));
        }

        let question_batch = vec![question.to_string()];
        let timeout = Duration::from_secs(self.cfg.embed_timeout_secs);
        let mut vectors = tokio::time::timeout(timeout, self.embedder.embed(&question_batch))
            .await
            .map_err(|_| StoreError::EmbeddingTimeout(self.cfg.embed_timeout_secs))??;
        let mut query_vector = vectors
            .pop()
            .ok_or(StoreError::Embedding(EmbedError::CountMismatch { expected: 1, got: 0 }))?;
        l2_normalize(&mut query_vector);

        Ok(index.search(Some(&query_vector), top_k))
    }

    #[instrument(skip(self, record), fields(paper_id = %record.paper_id, source_type = record.source_type.as_str()))]
    async fn build(&self, record: &SourceRecord) -> Result<Arc<VectorIndex>, StoreError> {
        let paper_id = record.paper_id;
        let fingerprint = record.fingerprint.clone();

        match record.source_type {
            SourceType::Unavailable => {
                Ok(Arc::new(VectorIndex::empty(paper_id, fingerprint)))
            }
            SourceType::MetadataOnly => {
                // Metadata grounding needs no embedding at all.
                let text = record.raw_text.clone().unwrap_or_default();
                if text.trim().is_empty() {
                    Ok(Arc::new(VectorIndex::empty(paper_id, fingerprint)))
                } else {
                    Ok(Arc::new(VectorIndex::degenerate(paper_id, fingerprint, text)))
                }
            }
            SourceType::FullTextPdfPrimary | SourceType::FullTextPdfSecondary => {
                let text = record.raw_text.as_deref().unwrap_or("");
                let chunks = chunk_text(paper_id, text, &self.cfg.chunker);
                if chunks.is_empty() {
                    // Unchunkable text degrades like a metadata-only paper.
                    debug!(paper_id = %paper_id, "full text yielded no chunks");
                    return Ok(Arc::new(VectorIndex::empty(paper_id, fingerprint)));
                }

                self.builds.fetch_add(1, Ordering::Relaxed);
                let t0 = std::time::Instant::now();
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let timeout = Duration::from_secs(self.cfg.embed_timeout_secs);

                let mut vectors = Vec::with_capacity(texts.len());
                for batch in texts.chunks(self.cfg.embed_batch_size.max(1)) {
                    let embedded = tokio::time::timeout(timeout, self.embedder.embed(batch))
                        .await
                        .map_err(|_| StoreError::EmbeddingTimeout(self.cfg.embed_timeout_secs))??;
                    vectors.extend(embedded);
                }
                if vectors.len() != chunks.len() {
                    return Err(StoreError::Embedding(EmbedError::CountMismatch {
                        expected: chunks.len(),
                        got: vectors.len(),
                    }));
                }
                for v in &mut vectors {
                    l2_normalize(v);
                }

                info!(
                    paper_id = %paper_id,
                    n_chunks = chunks.len(),
                    duration_ms = t0.elapsed().as_millis() as u64,
                    "index built"
                );
                Ok(Arc::new(VectorIndex::full(paper_id, fingerprint, chunks, vectors)))
            }
        }
    }
}

fn join_or_claim(state: &mut State, paper_id: PaperId) -> Decision {
    if let Some(rx) = state.in_flight.get(&paper_id) {
        Decision::Join(rx.clone())
    } else {
        let (tx, rx) = watch::channel(None);
        state.in_flight.insert(paper_id, rx);
        Decision::Claim(tx)
    }
}
