//! Colloquy state store adapters.
//!
//! Implements [`pipeline::CollaborationStore`] and [`pipeline::AgentDirectory`]
//! twice: [`JsonFileStore`] keeps one pretty-printed JSON file per record under
//! a data directory, and [`MemoryStore`] keeps everything in process for tests
//! and ephemeral runs.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** File layout, serialization and atomic replacement live
//! here. The [`pipeline`] crate sees only the two port traits.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
