//! Completion service port.
//!
//! The pipeline talks to a language model only through [`CompletionService`]:
//! an ordered list of role-tagged text blocks in, generated text (or failure)
//! out. Persona instructions come first, then context, then the task.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RetryPolicy;

/// Role tag of one prompt block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// Persona or context instructions.
    System,
    /// The request the model should answer.
    User,
}

/// One role-tagged text block of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBlock {
    /// Role tag.
    pub role: PromptRole,
    /// Block text.
    pub content: String,
}

/// An ordered completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Blocks in send order.
    pub blocks: Vec<PromptBlock>,
    /// Sampling temperature; `None` lets the service use its default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system block.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.blocks.push(PromptBlock {
            role: PromptRole::System,
            content: content.into(),
        });
        self
    }

    /// Appends a user block.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.blocks.push(PromptBlock {
            role: PromptRole::User,
            content: content.into(),
        });
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Text of the last user block, if any.
    pub fn last_user_block(&self) -> Option<&str> {
        self.blocks
            .iter()
            .rev()
            .find(|b| b.role == PromptRole::User)
            .map(|b| b.content.as_str())
    }
}

/// Failure of a single completion call.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// The request never produced an HTTP response (connect failure, timeout).
    #[error("Completion transport failed: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("Completion service returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error text extracted from the response body.
        message: String,
        /// Delay requested by the service (e.g. `Retry-After`).
        retry_after: Option<Duration>,
    },

    /// The response carried no generated text.
    #[error("Completion service returned no content")]
    EmptyContent,

    /// The response body could not be understood.
    #[error("Completion response was malformed: {message}")]
    MalformedResponse {
        /// Description of the decoding problem.
        message: String,
    },

    /// The service cannot be used as configured (e.g. missing API key).
    #[error("Completion service is not configured: {message}")]
    NotConfigured {
        /// Description of the missing configuration.
        message: String,
    },
}

impl CompletionError {
    /// Whether the failed call may be re-issued.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
            Self::Http {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generates text for `request`.
    ///
    /// Implementations may return empty text; callers decide whether that is a
    /// failure.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
