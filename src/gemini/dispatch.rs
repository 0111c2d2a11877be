//! Generation dispatch with key rotation
//!
//! Provides:
//! - One-call orchestration: build request, try every key, classify failures
//! - Response normalization into text plus PNG files in the temp dir

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use image::RgbaImage;
use tracing::{info, warn};
use uuid::Uuid;

use crate::images;

use super::pool::KeyPool;
use super::wire::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use super::{GeminiClient, GenerateError};

/// Normalized result of a successful generation
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Concatenated text parts, possibly empty
    pub text: String,
    /// Saved image files, in response part order
    pub images: Vec<PathBuf>,
}

/// Runs generation calls across the key pool.
///
/// One `generate()` call tries every key at most once (in the pool's planned
/// order) and returns the first success. The round-robin cursor moves only
/// when an attempt succeeds.
#[derive(Debug)]
pub struct Dispatcher {
    client: GeminiClient,
    pool: KeyPool,
    /// Directory generated PNGs are written to
    temp_dir: PathBuf,
    /// Style suffix appended to every prompt, when configured
    prompt_suffix: Option<String>,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        client: GeminiClient,
        pool: KeyPool,
        temp_dir: PathBuf,
        prompt_suffix: Option<String>,
    ) -> Self {
        Self {
            client,
            pool,
            temp_dir,
            prompt_suffix,
        }
    }

    /// Key pool backing this dispatcher
    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Generate from a prompt plus zero or more reference images.
    ///
    /// Reference images ride along as inline PNG parts in the order given.
    /// Fails fast with `NoKeys` when the pool is empty; otherwise returns the
    /// first successful attempt or the error of the last failed one.
    pub async fn generate(
        &self,
        prompt: &str,
        references: &[RgbaImage],
    ) -> Result<Generation, GenerateError> {
        if self.pool.is_empty() {
            return Err(GenerateError::NoKeys);
        }

        let request = self.build_request(prompt, references)?;
        let plan = self.pool.plan();
        let mut last_error = None;

        for (attempt, index) in plan.iter().copied().enumerate() {
            let Some(key) = self.pool.key(index) else {
                continue;
            };

            match self.try_key(key, index, &request).await {
                Ok(generation) => {
                    self.pool.advance(index);
                    info!(
                        "generation succeeded with key {}/{}: {} image(s), {} text chars",
                        index + 1,
                        self.pool.len(),
                        generation.images.len(),
                        generation.text.len()
                    );
                    return Ok(generation);
                }
                Err(err) => {
                    warn!(
                        "generation attempt {}/{} with key {} failed: {}",
                        attempt + 1,
                        plan.len(),
                        index + 1,
                        err
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenerateError::Transport("no attempt could run".to_string())))
    }

    /// Assemble the request once; all attempts reuse it
    fn build_request(
        &self,
        prompt: &str,
        references: &[RgbaImage],
    ) -> Result<GenerateContentRequest, GenerateError> {
        let mut text = prompt.trim().to_string();
        if let Some(suffix) = self.prompt_suffix.as_deref().filter(|s| !s.is_empty()) {
            if text.is_empty() {
                text = suffix.to_string();
            } else {
                text.push_str(", ");
                text.push_str(suffix);
            }
        }

        // The API rejects empty text parts; image-only edits send none
        let mut parts = Vec::new();
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        for reference in references {
            let png = images::encode_png(reference).map_err(|e| {
                GenerateError::Transport(format!("failed to encode reference image: {}", e))
            })?;
            parts.push(Part::inline_png(BASE64.encode(png)));
        }

        if parts.is_empty() {
            return Err(GenerateError::Transport(
                "nothing to send: empty prompt and no reference images".to_string(),
            ));
        }

        Ok(GenerateContentRequest {
            contents: vec![Content::user(parts)],
            generation_config: GenerationConfig::text_and_image(),
        })
    }

    async fn try_key(
        &self,
        key: &str,
        key_index: usize,
        request: &GenerateContentRequest,
    ) -> Result<Generation, GenerateError> {
        let response = self.client.generate(key, request).await?;
        self.extract(response, key_index)
    }

    /// Validate a response and walk its parts into a `Generation`
    fn extract(
        &self,
        response: GenerateContentResponse,
        key_index: usize,
    ) -> Result<Generation, GenerateError> {
        let GenerateContentResponse {
            candidates,
            prompt_feedback,
        } = response;

        let Some(candidate) = candidates.into_iter().next() else {
            if let Some(reason) = prompt_feedback.and_then(|f| f.block_reason) {
                return Err(GenerateError::SafetyBlocked(format!(
                    "prompt blocked: {}",
                    reason
                )));
            }
            return Err(GenerateError::EmptyResponse(
                "response contained no candidates".to_string(),
            ));
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if matches!(reason, "SAFETY" | "IMAGE_SAFETY" | "PROHIBITED_CONTENT") {
                return Err(GenerateError::SafetyBlocked(format!(
                    "generation stopped: {}",
                    reason
                )));
            }
        }

        let Some(content) = candidate.content else {
            return Err(GenerateError::EmptyResponse(
                "candidate carried no content".to_string(),
            ));
        };
        if content.parts.is_empty() {
            return Err(GenerateError::EmptyResponse(
                "candidate carried no parts".to_string(),
            ));
        }

        let mut text = String::new();
        let mut files = Vec::new();
        for part in content.parts {
            match part {
                Part::Text { text: piece } => text.push_str(&piece),
                Part::Inline { inline_data } => {
                    let bytes = BASE64.decode(inline_data.data.as_bytes()).map_err(|e| {
                        GenerateError::EmptyResponse(format!("undecodable inline payload: {}", e))
                    })?;
                    let rgba = images::decode_rgba(&bytes).map_err(|e| {
                        GenerateError::EmptyResponse(format!("unreadable generated image: {}", e))
                    })?;

                    let path = self.temp_dir.join(format!(
                        "gen_{}_{}_{}.png",
                        Utc::now().timestamp_millis(),
                        key_index,
                        Uuid::new_v4()
                    ));
                    images::save_png(&rgba, &path).map_err(|e| {
                        GenerateError::EmptyResponse(format!(
                            "failed to store generated image: {}",
                            e
                        ))
                    })?;
                    files.push(path);
                }
                // Function calls and other part kinds carry nothing deliverable
                Part::Other(_) => {}
            }
        }

        if text.is_empty() && files.is_empty() {
            return Err(GenerateError::EmptyResponse(
                "candidate yielded neither text nor image".to_string(),
            ));
        }

        Ok(Generation {
            text,
            images: files,
        })
    }
}
