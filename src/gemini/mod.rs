//! Gemini API integration
//!
//! Provides:
//! - generateContent calls against the Gemini REST API
//! - API key rotation with full-set failover
//! - Response normalization into text plus generated image files

pub mod dispatch;
pub mod pool;
pub mod wire;

pub use dispatch::{Dispatcher, Generation};
pub use pool::KeyPool;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use wire::{ErrorBody, GenerateContentRequest, GenerateContentResponse};

/// Failure modes of a generation request
#[derive(Debug, Error)]
pub enum GenerateError {
    /// No usable API key is configured
    #[error("no API keys configured")]
    NoKeys,
    /// The safety system rejected the prompt or the generated content
    #[error("generation blocked by safety system: {0}")]
    SafetyBlocked(String),
    /// The model answered without any usable text or image content
    #[error("model returned no usable content: {0}")]
    EmptyResponse(String),
    /// Network or HTTP-level failure
    #[error("transport failure: {0}")]
    Transport(String),
    /// The request exceeded the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),
}

/// Client for the Gemini generateContent endpoint.
///
/// Holds no credentials; each call is made with the key the dispatcher
/// selected for that attempt.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    /// Shared HTTP client; carries the request timeout
    http: Client,
    /// API base URL without trailing slash
    base_url: String,
    /// Model identifier, e.g. "gemini-2.0-flash-exp"
    model: String,
}

impl GeminiClient {
    /// Create a client for one base URL + model pair
    pub fn new(http: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            model: model.into(),
        }
    }

    /// Model this client generates with
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one generateContent request authenticated with `api_key`
    pub async fn generate(
        &self,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerateError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        debug!("sending generateContent request to model {}", self.model);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => parsed.error.message.unwrap_or(body),
                Err(_) => body,
            };
            warn!("Gemini API error: {} - {}", status, detail);
            return Err(GenerateError::Transport(format!(
                "API error {}: {}",
                status, detail
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GenerateError::EmptyResponse(format!("unparseable response body: {}", e)))
    }
}

fn classify_send_error(err: reqwest::Error) -> GenerateError {
    if err.is_timeout() {
        GenerateError::Timeout(err.to_string())
    } else {
        GenerateError::Transport(err.to_string())
    }
}
