use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::OracleError;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Free-text completion service used by the generation pipelines.
///
/// Replies are untrusted: they may carry Markdown fences or wrap the intended
/// JSON in extra structure.
pub trait TextInference: Send + Sync {
    fn infer_text(&self, prompt: &str) -> Result<String, OracleError>;
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, OracleError> {
    Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, OracleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(OracleError::BadStatus {
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Ollama Backend
// ============================================================================

pub struct OllamaBackend {
    pub endpoint: String,
    pub model: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            client: http_client(timeout)?,
        })
    }
}

impl TextInference for OllamaBackend {
    fn infer_text(&self, prompt: &str) -> Result<String, OracleError> {
        debug!(endpoint = %self.endpoint, model = %self.model, "querying ollama");
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&self.endpoint).json(&request).send()?;
        let parsed: OllamaResponse = check_status(response)?.json()?;
        if parsed.response.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(parsed.response)
    }
}

// ============================================================================
// Gemini Backend
// ============================================================================

pub struct GeminiBackend {
    pub endpoint: String,
    pub model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiBackend {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Build from an API key held in `env_var`.
    pub fn from_env(
        endpoint: &str,
        model: &str,
        env_var: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let key = std::env::var(env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::MissingApiKey(env_var.to_string()))?;
        Self::new(endpoint, model, &key, timeout)
    }
}

impl TextInference for GeminiBackend {
    fn infer_text(&self, prompt: &str) -> Result<String, OracleError> {
        debug!(model = %self.model, "querying gemini");
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?;
        let parsed: Value = check_status(response)?.json()?;

        parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(OracleError::EmptyResponse)
    }
}

// ============================================================================
// Mock Backend (for testing without a live model)
// ============================================================================

/// Returns the same canned reply for every prompt.
pub struct MockTextInference {
    pub response: String,
}

impl MockTextInference {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl TextInference for MockTextInference {
    fn infer_text(&self, _prompt: &str) -> Result<String, OracleError> {
        if self.response.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(self.response.clone())
    }
}
