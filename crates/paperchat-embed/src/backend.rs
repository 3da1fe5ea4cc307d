//! Embedding backend trait and concrete implementations.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};
use crate::error::{EmbedError, Result};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be order-preserving (vector `i` belongs to text `i`)
/// and deterministic for a fixed model configuration: re-embedding identical
/// text yields the identical vector, which is what makes indices
/// reproducible across restarts.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch. Any per-text failure fails the whole batch; partial
    /// results are never returned.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dim(&self) -> usize;

    fn model_id(&self) -> &str;
}

/// Build the backend named by the configuration.
pub fn build_backend(cfg: &EmbeddingConfig) -> Arc<dyn EmbeddingBackend> {
    match cfg.backend {
        EmbeddingBackendKind::OpenAiCompatible => Arc::new(OpenAiCompatibleEmbedder::new(cfg)),
        EmbeddingBackendKind::Ollama => Arc::new(OllamaEmbedder::new(cfg)),
        EmbeddingBackendKind::Hashing => Arc::new(HashingEmbedder::new(cfg.dim)),
    }
}

/// L2-normalize a vector in place; zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn check_batch(vectors: Vec<Vec<f32>>, expected_count: usize, expected_dim: usize) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(EmbedError::CountMismatch { expected: expected_count, got: vectors.len() });
    }
    for v in &vectors {
        if v.len() != expected_dim {
            return Err(EmbedError::DimensionMismatch { expected: expected_dim, got: v.len() });
        }
    }
    Ok(vectors)
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(EmbedError::Api { status, message });
    }
    Ok(body)
}

// ── OpenAI-compatible (/v1/embeddings) ───────────────────────────────────────

pub struct OpenAiCompatibleEmbedder {
    base_url: String,
    model: String,
    dim: usize,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Self {
        Self {
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: cfg.model.clone(),
            dim: cfg.dim,
            api_key: cfg.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiCompatibleEmbedder {
    #[instrument(skip(self, texts), fields(n = texts.len(), model = %self.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({ "model": &self.model, "input": texts });

        let mut req = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let json = check_response_status(req.send().await?).await?;

        let data = json["data"]
            .as_array()
            .ok_or_else(|| EmbedError::Unavailable("response carried no data array".to_string()))?;
        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let v: Vec<f32> = serde_json::from_value(item["embedding"].clone())?;
            vectors.push(v);
        }
        check_batch(vectors, texts.len(), self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Ollama (/api/embeddings) ─────────────────────────────────────────────────

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dim: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Self {
        Self {
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: cfg.model.clone(),
            dim: cfg.dim,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbedder {
    #[instrument(skip(self, texts), fields(n = texts.len(), model = %self.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({ "model": &self.model, "prompt": text });
            let json = check_response_status(self.client.post(&url).json(&body).send().await?).await?;
            let v: Vec<f32> = serde_json::from_value(json["embedding"].clone())?;
            vectors.push(v);
        }
        check_batch(vectors, texts.len(), self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Deterministic token hashing ──────────────────────────────────────────────

/// Offline embedder: lowercased whitespace tokens are hashed into a
/// fixed-dimension bag-of-words vector, L2-normalized.
///
/// Deterministic by construction (SHA-256, no ambient state), so it doubles
/// as the reference backend for the reproducibility tests. Retrieval quality
/// is lexical rather than semantic, which is enough for development.
pub struct HashingEmbedder {
    dim: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), model: "token-hashing".to_string() }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_be_bytes(digest[..8].try_into().unwrap()) % self.dim as u64;
            v[bucket as usize] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingBackend for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
