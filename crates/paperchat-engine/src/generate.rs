//! Generation backend trait and concrete implementations.
//!
//! Backends:
//!   OpenAiCompatibleBackend — any /v1/chat/completions endpoint (OpenAI,
//!                             Groq, OpenRouter, vLLM, LM Studio, Ollama)
//!   GeminiBackend           — Google Gemini generateContent API

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{GenerationBackendKind, GenerationConfig};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("generation timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
}

/// Build the backend named by the configuration.
pub fn build_backend(cfg: &GenerationConfig) -> Arc<dyn GenerationBackend> {
    match cfg.backend {
        GenerationBackendKind::OpenAiCompatible => Arc::new(OpenAiCompatibleBackend::new(cfg)),
        GenerationBackendKind::Gemini => Arc::new(GeminiBackend::new(cfg)),
    }
}

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::Api { status, message });
    }
    Ok(body)
}

// ── OpenAI-compatible ─────────────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(cfg: &GenerationConfig) -> Self {
        Self {
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model":       &self.model,
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(1024),
            "temperature": req.temperature.unwrap_or(0.3),
        });
        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        let json = check_response_status(request.send().await?).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Google Gemini ─────────────────────────────────────────────────────────────

pub struct GeminiBackend {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(cfg: &GenerationConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone().unwrap_or_default(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::Unavailable(
                "Gemini backend needs an API key (GEMINI_API_KEY)".to_string(),
            ));
        }
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        // System message becomes the systemInstruction block.
        let system_text = req
            .messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = req
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": m.content }]
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": req.max_tokens.unwrap_or(1024),
                "temperature":     req.temperature.unwrap_or(0.3),
            }
        });
        if let Some(system) = system_text {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }

        let json = check_response_status(self.client.post(&url).json(&body).send().await?).await?;

        let content = json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(LlmResponse {
            content,
            model: self.model.clone(),
            prompt_tokens: json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;

    #[test]
    fn test_openai_compatible_defaults() {
        let cfg = GenerationConfig {
            backend: GenerationBackendKind::OpenAiCompatible,
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        let b = OpenAiCompatibleBackend::new(&cfg);
        assert_eq!(b.model_id(), "gpt-4o-mini");
        assert_eq!(b.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_no_api_key_is_valid_for_local_endpoints() {
        let cfg = GenerationConfig {
            backend: GenerationBackendKind::OpenAiCompatible,
            model: "local-model".to_string(),
            base_url: Some("http://localhost:11434".to_string()),
            ..Default::default()
        };
        let b = OpenAiCompatibleBackend::new(&cfg);
        assert!(b.api_key.is_none());
    }

    #[tokio::test]
    async fn test_gemini_without_key_is_unavailable() {
        let cfg = GenerationConfig {
            backend: GenerationBackendKind::Gemini,
            api_key: None,
            ..Default::default()
        };
        let b = GeminiBackend::new(&cfg);
        let req = LlmRequest {
            messages: vec![Message::user("hi")],
            max_tokens: None,
            temperature: None,
        };
        assert!(matches!(b.complete(req).await, Err(LlmError::Unavailable(_))));
    }

    #[test]
    fn test_parse_openai_response_shape() {
        let json = serde_json::json!({
            "model": "m",
            "choices": [{"message": {"content": "an answer"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4}
        });
        let resp = parse_openai_response(&json, "fallback");
        assert_eq!(resp.content, "an answer");
        assert_eq!(resp.prompt_tokens, 10);
        assert_eq!(resp.completion_tokens, 4);
    }

    #[test]
    fn test_build_backend_honours_kind() {
        let b = build_backend(&GenerationConfig::default());
        assert_eq!(b.model_id(), "gemini-2.0-flash");
    }
}
