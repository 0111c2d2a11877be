//! Gemini generateContent wire types
//!
//! Provides:
//! - Request and response bodies for the `models/{model}:generateContent` call
//! - Multimodal part assembly (text + inline base64 images)

use serde::{Deserialize, Serialize};

/// Request body for a generateContent call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// Generation tuning; `response_modalities` asks the model for both text and
/// image output on image-capable models
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

impl GenerationConfig {
    /// Config requesting mixed text + image output
    pub fn text_and_image() -> Self {
        Self {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
        }
    }
}

/// One conversational turn (request) or generated turn (response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn holding the given parts
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }
}

/// One piece of a turn. Untagged: the wire shape is keyed by which field is
/// present. Unknown part kinds land in `Other` instead of failing the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Other(serde_json::Value),
}

impl Part {
    /// A plain text part
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// An inline PNG part from already-encoded base64 data
    pub fn inline_png(data: impl Into<String>) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: "image/png".to_string(),
                data: data.into(),
            },
        }
    }

    /// Text payload, if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Inline payload, if this is an inline-data part
    pub fn as_inline(&self) -> Option<&InlineData> {
        match self {
            Part::Inline { inline_data } => Some(inline_data),
            _ => None,
        }
    }
}

/// Base64 blob with its MIME type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Response body of a generateContent call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

/// One generated candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

/// Prompt-level feedback; `block_reason` is set when the prompt itself was
/// rejected before any candidate was produced
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    pub block_reason_message: Option<String>,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub status: Option<String>,
}
