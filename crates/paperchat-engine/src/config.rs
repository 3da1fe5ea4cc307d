//! Engine configuration.
//! Reads paperchat.toml from the current directory or the path in the
//! PAPERCHAT_CONFIG env var; API keys come from the environment.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use paperchat_embed::{EmbeddingBackendKind, EmbeddingConfig};
use paperchat_ingest::ResolverConfig;
use paperchat_store::StoreConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationBackendKind {
    OpenAiCompatible,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_backend")]
    pub backend: GenerationBackendKind,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Base URL for OpenAI-compatible endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_generation_backend() -> GenerationBackendKind { GenerationBackendKind::Gemini }
fn default_generation_model() -> String { "gemini-2.0-flash".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_temperature() -> f32 { 0.3 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_generation_backend(),
            model: default_generation_model(),
            base_url: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Everything the engine needs from its environment, no hidden globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

fn default_top_k() -> usize { 5 }
fn default_generation_timeout_secs() -> u64 { 60 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            resolver: ResolverConfig::default(),
            store: StoreConfig::default(),
            top_k: default_top_k(),
            generation_timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Load configuration. A missing file yields the documented defaults;
    /// API keys are filled from the environment when the file leaves them
    /// unset.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("PAPERCHAT_CONFIG")
            .unwrap_or_else(|_| "paperchat.toml".to_string());
        let mut config: Self = if Path::new(&path).exists() {
            toml::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };

        if config.generation.api_key.is_none() {
            config.generation.api_key = match config.generation.backend {
                GenerationBackendKind::Gemini => std::env::var("GEMINI_API_KEY").ok(),
                GenerationBackendKind::OpenAiCompatible => std::env::var("OPENAI_API_KEY").ok(),
            };
        }
        if config.embedding.api_key.is_none()
            && config.embedding.backend == EmbeddingBackendKind::OpenAiCompatible
        {
            config.embedding.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        Ok(config)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
