//! Chat-completions wire types (OpenAI-compatible).

use serde::{Deserialize, Serialize};

use pipeline::{CompletionRequest, PromptRole};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatRequest<'a> {
    /// Maps a domain request onto the wire format, filling in the default
    /// temperature when the request does not set one.
    pub fn from_domain(model: &'a str, request: &'a CompletionRequest, default_temperature: f32) -> Self {
        Self {
            model,
            messages: request
                .blocks
                .iter()
                .map(|b| ChatMessage {
                    role: match b.role {
                        PromptRole::System => "system",
                        PromptRole::User => "user",
                    },
                    content: &b.content,
                })
                .collect(),
            temperature: Some(request.temperature.unwrap_or(default_temperature)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}
