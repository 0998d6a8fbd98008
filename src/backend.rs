//! The metered operation: text generation behind the payment gate.
//!
//! The gate does not care what the backend does; it only decides whether a
//! request may reach it. [`GeminiBackend`] talks to the Gemini
//! `generateContent` REST API.

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// A generative text backend.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Whether the backend has the credentials it needs.
    fn is_configured(&self) -> bool;

    /// Generate text for `prompt` using `model`.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

/// Gemini REST client.
pub struct GeminiBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Model names end up in the request path.
fn is_valid_model_name(model: &str) -> bool {
    !model.is_empty()
        && model
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    if let Some(err) = response.error {
        return Err(Error::Backend(err.message));
    }
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .ok_or_else(|| Error::Backend("response contained no candidates".to_string()))?;
    Ok(text)
}

impl GeminiBackend {
    /// Create a backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build backend client: {e}")))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("backend API key is not set".to_string()))?;
        if !is_valid_model_name(model) {
            return Err(Error::Backend(format!("invalid model name: {model:?}")));
        }

        let url = format!(
            "{}/v1beta/models/{model}:generateContent",
            self.config.endpoint.trim_end_matches('/')
        );
        debug!("Generating with {model}");

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        let status = response.status();
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("undecodable response ({status}): {e}")))?;
        extract_text(body)
    }
}
