//! Core collaboration domain for Colloquy.
//!
//! This crate contains every domain concept, newtype identifier, value type,
//! pure pipeline rule and port trait used by the multi-agent collaboration
//! pipeline. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`AgentId`, `CollaborationId`, etc.) |
//! | [`types`] | Agents, messages, phases, timestamps |
//! | [`collaboration`] | The collaboration aggregate and its status machine |
//! | [`roster`] | Roster assembly and coordinator selection |
//! | [`breakdown`] | Task breakdown model and decode-with-repair |
//! | [`context`] | Conversation context windowing |
//! | [`prompts`] | Prompt construction |
//! | [`events`] | Progress events and SSE framing |
//! | [`completion`] | Completion service port |
//! | [`storage`] | State store ports |
//! | [`errors`] | Top-level error and retry-policy types |

pub mod breakdown;
pub mod collaboration;
pub mod completion;
pub mod context;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod prompts;
pub mod roster;
pub mod storage;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use breakdown::{
    decode_breakdown, fallback_breakdown, strip_code_fences, DecompositionOutcome,
    TaskAssignment, TaskBreakdown,
};
pub use collaboration::{Collaboration, CollaborationStatus};
pub use completion::{
    CompletionError, CompletionRequest, CompletionService, PromptBlock, PromptRole,
};
pub use context::{render_context, DEFAULT_CONTEXT_WINDOW};
pub use errors::{CollaborationError, RetryPolicy, StoreError};
pub use events::{parse_sse_line, CollaborationEvent, SseLine, SSE_DONE};
pub use identifiers::{AgentId, CollaborationId, MessageId, PipelineRunId};
pub use roster::{select_coordinator, Roster};
pub use storage::{AgentDirectory, CollaborationStore};
pub use types::{Agent, AgentRole, Message, MessageRole, Phase, Timestamp};
