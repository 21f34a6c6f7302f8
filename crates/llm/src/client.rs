//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use tracing::instrument;

use pipeline::{CompletionError, CompletionRequest, CompletionService, RetryPolicy};

use crate::types::{ApiError, ChatRequest, ChatResponse};
use crate::{LlmConfig, LlmError};

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// [`CompletionService`] backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompletionService {
    client: Client,
    config: LlmConfig,
    api_key: String,
}

impl OpenAiCompletionService {
    /// Builds the HTTP client. Fails when no API key is configured.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatRequest::from_domain(&self.config.model, request, self.config.temperature);
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.map_err(|e| CompletionError::Transport {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(http_error(status, &text, retry_after));
        }
        extract_content(&text)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    #[instrument(skip_all, fields(model = %self.config.model, blocks = request.blocks.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut attempt = 1;
        loop {
            match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    let RetryPolicy::Retryable { after } = e.retry_policy() else {
                        return Err(e);
                    };
                    if attempt >= self.config.max_attempts {
                        return Err(e);
                    }
                    let delay = after.unwrap_or_else(|| backoff(attempt));
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for OpenAiCompletionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionService")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Exponential back-off for the given (1-based) failed attempt.
fn backoff(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(Duration::from_secs_f64)
}

fn http_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> CompletionError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    CompletionError::Http {
        status: status.as_u16(),
        message,
        retry_after,
    }
}

/// Pulls the first choice's text out of a response body.
fn extract_content(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::MalformedResponse {
            message: e.to_string(),
        })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(CompletionError::EmptyContent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_extract_content_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}},
                       {"message":{"content":"ignored"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hello");
    }

    #[test]
    fn test_extract_content_empty_and_malformed() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(CompletionError::EmptyContent)
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(CompletionError::EmptyContent)
        ));
        assert!(matches!(
            extract_content("<html>"),
            Err(CompletionError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_http_error_prefers_api_message() {
        let err = http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#,
            Some(Duration::from_secs(1)),
        );
        match err {
            CompletionError::Http {
                status,
                ref message,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            ref other => panic!("unexpected {other:?}"),
        }
        assert!(err.retry_policy().is_retryable());

        let err = http_error(StatusCode::BAD_REQUEST, "plain text", None);
        assert!(err.to_string().contains("plain text"));
        assert!(!err.retry_policy().is_retryable());
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(1500)));
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(2));
        assert_eq!(backoff(30), MAX_BACKOFF);
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(
            OpenAiCompletionService::new(config),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_request_body_uses_default_temperature() {
        let request = CompletionRequest::new().system("persona").user("task");
        let body = serde_json::to_value(ChatRequest::from_domain("gpt-4o-mini", &request, 0.7))
            .unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "task");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }
}
