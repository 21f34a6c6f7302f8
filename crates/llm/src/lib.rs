//! Colloquy completion provider infrastructure adapter.
//!
//! Implements the [`pipeline::CompletionService`] trait for OpenAI-compatible
//! chat-completions endpoints. Additional providers are added as new `impl`
//! blocks in this crate without any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response parsing,
//! `Retry-After` handling, and exponential back-off live here. The
//! [`pipeline`] crate sees only [`pipeline::CompletionService`].
//!
//! The [`mock`] module provides a scripted service for tests in downstream crates.

use std::time::Duration;

use thiserror::Error;

mod client;
pub mod mock;
mod types;

pub use client::OpenAiCompletionService;
pub use mock::{MockReply, ScriptedCompletionService};

/// Connection settings for [`OpenAiCompletionService`].
#[derive(Clone)]
pub struct LlmConfig {
    /// API root, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Temperature for requests that do not set their own.
    pub temperature: f32,
    /// Total attempts per call, first try included.
    pub max_attempts: u32,
    /// Per-attempt timeout.
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.7,
            max_attempts: 3,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Errors raised while constructing a provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was supplied.
    #[error("No API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    /// The HTTP client could not be built.
    #[error("HTTP client could not be built: {0}")]
    ClientBuild(#[from] reqwest::Error),
}
