//! Scripted completion service for deterministic tests without API calls.
//!
//! Replies are chosen by rules matched against the request text; the first
//! matching rule wins and rules are never consumed, so one rule can answer
//! any number of calls. Requests that match no rule get the default reply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use pipeline::{CompletionError, CompletionRequest, CompletionService, PromptRole};

/// A pre-programmed reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Fail(CompletionError),
    /// Wait, then produce the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    /// Convenience: a text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Convenience: a transport failure.
    pub fn unavailable() -> Self {
        Self::Fail(CompletionError::Transport {
            message: "service unavailable".to_string(),
        })
    }

    /// Convenience: wrap any reply with a delay.
    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Only the first system block (the persona).
    Persona,
    /// Any block.
    Anywhere,
}

#[derive(Debug)]
struct Rule {
    scope: Scope,
    needle: String,
    reply: MockReply,
}

impl Rule {
    fn matches(&self, request: &CompletionRequest) -> bool {
        match self.scope {
            Scope::Persona => request
                .blocks
                .first()
                .is_some_and(|b| b.role == PromptRole::System && b.content.contains(&self.needle)),
            Scope::Anywhere => request.blocks.iter().any(|b| b.content.contains(&self.needle)),
        }
    }
}

/// Rule-driven [`CompletionService`] that records every request it sees.
#[derive(Debug)]
pub struct ScriptedCompletionService {
    rules: Vec<Rule>,
    default_reply: MockReply,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

/// Counts one call as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(current)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for ScriptedCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCompletionService {
    /// A service that echoes a fixed text for any request.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_reply: MockReply::text("ok"),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A service on which every call fails.
    pub fn unavailable() -> Self {
        Self::new().otherwise(MockReply::unavailable())
    }

    /// Answers requests whose persona (first system block) contains `needle`.
    pub fn when_persona(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push(Rule {
            scope: Scope::Persona,
            needle: needle.into(),
            reply,
        });
        self
    }

    /// Answers requests where any block contains `needle`.
    pub fn when_contains(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push(Rule {
            scope: Scope::Anywhere,
            needle: needle.into(),
            reply,
        });
        self
    }

    /// Reply for requests no rule matches.
    pub fn otherwise(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Copies of all requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let mut reply = self
            .rules
            .iter()
            .find(|rule| rule.matches(request))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| self.default_reply.clone());

        loop {
            match reply {
                MockReply::Text(text) => return Ok(text),
                MockReply::Fail(error) => return Err(error),
                MockReply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
