//! Chat-completion client for the author fallback.
//!
//! Defines the [`LlmClient`] trait and two implementations:
//! - **[`DisabledClient`]**: every request fails with [`LlmError::Disabled`];
//!   used when `llm.provider = "disabled"`.
//! - **[`OpenAiClient`]**: calls an OpenAI-compatible
//!   `POST {base_url}/chat/completions` endpoint over a blocking HTTP client.
//!
//! Use [`create_client`] to build the client named by configuration.
//!
//! Requests are issued once, without retry, and bounded by the configured
//! timeout. Callers treat every [`LlmError`] as "no answer".

use anyhow::{bail, Result};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

/// Which configured model a request should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Standard,
    Advanced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub tier: ModelTier,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider is disabled")]
    Disabled,
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

/// A plain-text completion backend.
pub trait LlmClient: Send + Sync {
    /// Provider identifier (e.g. `"openai"`).
    fn name(&self) -> &str;
    /// Run one completion and return the raw response text.
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

// ============ Disabled Client ============

pub struct DisabledClient;

impl LlmClient for DisabledClient {
    fn name(&self) -> &str {
        "disabled"
    }

    fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

// ============ OpenAI Client ============

/// Client for OpenAI-compatible chat-completion APIs.
///
/// The API key is read from `OPENAI_API_KEY` at construction. A missing key
/// is not a construction error; each request then fails with
/// [`LlmError::MissingApiKey`].
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    standard_model: String,
    advanced_model: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            standard_model: config.standard_model.clone(),
            advanced_model: config.advanced_model.clone(),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
        })
    }

    fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Advanced => &self.advanced_model,
        }
    }
}

impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = json!({
            "model": self.model(request.tier),
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": request.max_tokens,
            "temperature": 0,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json()?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`, trimmed.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()))
}

/// Create the LLM client named by `config.provider`.
pub fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledClient)),
        "openai" => Ok(Box::new(OpenAiClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
