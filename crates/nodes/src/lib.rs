//! Colloquy orchestration layer.
//!
//! This crate drives one collaboration run end to end: it decomposes the user
//! request into per-agent assignments, sequences the Planning, Execution and
//! Integration phases against the completion service, persists every
//! transcript append and streams progress events to the caller.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The types here sequence calls between business
//! logic in the [`pipeline`] crate and the infrastructure traits it defines
//! ([`pipeline::CompletionService`], [`pipeline::CollaborationStore`],
//! [`pipeline::AgentDirectory`]). They contain no domain rules of their own.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`emitter`] | Ordered, lossless event channel with cancellation |
//! | [`decomposer`] | Task decomposition over the completion service |
//! | [`executor`] | The phase pipeline state machine and execution fan-out |
//! | [`service`] | Input validation, roster resolution and run entry point |
//! | [`factory`] | Agent persona generation |

pub mod decomposer;
pub mod emitter;
pub mod executor;
pub mod factory;
pub mod service;

pub use decomposer::TaskDecomposer;
pub use emitter::{Cancelled, EventEmitter};
pub use executor::{PhaseExecutor, RunOutcome, RunSettings, Stage};
pub use factory::{AgentFactory, AgentGenerationError};
pub use service::CollaborationService;
