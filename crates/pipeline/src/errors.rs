//! Top-level error and retry-policy types for the collaboration domain.
//!
//! [`CollaborationError`] covers conditions that stop a pipeline run before it
//! starts (input rejections) or abort it part way (state store failure).
//! Completion failures are defined in [`crate::completion`] because the
//! pipeline degrades around them instead of surfacing them.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any infrastructure error type that
//! participates in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CollaborationId;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let adapters decide whether to
/// re-issue an operation before reporting failure.
///
/// - `Retryable` errors: API timeouts, transient rate-limit responses, 5xx.
/// - `NonRetryable` errors: authentication failures, malformed requests,
///   serialisation faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// State store errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`crate::CollaborationStore`] or [`crate::AgentDirectory`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing medium could not be read or written.
    #[error("Storage I/O failed for '{key}': {source}")]
    Io {
        /// Record key (usually the aggregate id).
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be encoded or decoded.
    #[error("Stored record '{key}' is not valid: {source}")]
    Serialization {
        /// Record key (usually the aggregate id).
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The record to update or delete does not exist.
    #[error("No stored record for '{key}'")]
    NotFound {
        /// Record key that was looked up.
        key: String,
    },
}

impl StoreError {
    /// Storage failures are never retried inside a pipeline run.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::NonRetryable
    }
}

// ---------------------------------------------------------------------------
// Caller-visible errors
// ---------------------------------------------------------------------------

/// Errors surfaced to the caller of the collaboration service.
///
/// Input variants are raised before any phase starts: the transcript is left
/// untouched and no event is emitted. Decomposition and per-agent completion
/// failures never appear here; they degrade inside the run.
#[derive(Debug, Error)]
pub enum CollaborationError {
    /// The user message was empty or whitespace only.
    #[error("Message is required")]
    EmptyMessage,

    /// None of the collaboration's selected agents could be resolved.
    #[error("No valid agents found for this collaboration")]
    NoAgents,

    /// No collaboration is stored under the given id.
    #[error("Collaboration not found: {id}")]
    CollaborationNotFound {
        /// The id that was looked up.
        id: CollaborationId,
    },

    /// The collaboration reached its terminal state; new runs are rejected.
    #[error("Collaboration {id} is already completed")]
    AlreadyCompleted {
        /// The completed collaboration.
        id: CollaborationId,
    },

    /// A collaboration could not be created or mutated because its data
    /// violates an aggregate rule.
    #[error("Invalid collaboration: {message}")]
    InvalidCollaboration {
        /// Description of the violated rule.
        message: String,
    },

    /// The state store failed while loading or persisting.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Runtime configuration is invalid.
    ///
    /// Produced at load time; the service never starts with an invalid config.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

impl CollaborationError {
    /// Returns `true` for rejections raised before any phase started.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage
                | Self::NoAgents
                | Self::CollaborationNotFound { .. }
                | Self::AlreadyCompleted { .. }
                | Self::InvalidCollaboration { .. }
        )
    }
}
