//! Configuration for the embedding backends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackendKind {
    /// Any /v1/embeddings endpoint (OpenAI, Together, vLLM, LM Studio, …).
    OpenAiCompatible,
    /// Local Ollama /api/embeddings.
    Ollama,
    /// Deterministic offline token hashing; no model, no network.
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_backend")]
    pub backend: EmbeddingBackendKind,
    /// Model identifier as understood by the backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Vector dimension the backend is expected to produce.
    #[serde(default = "default_dim")]
    pub dim: usize,
    /// Base URL for HTTP backends.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_backend() -> EmbeddingBackendKind { EmbeddingBackendKind::Ollama }
fn default_model() -> String { "nomic-embed-text".to_string() }
fn default_dim() -> usize { 768 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_model(),
            dim: default_dim(),
            base_url: None,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    /// Offline hashing backend, useful for development and tests.
    pub fn hashing(dim: usize) -> Self {
        Self {
            backend: EmbeddingBackendKind::Hashing,
            model: "token-hashing".to_string(),
            dim,
            base_url: None,
            api_key: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
