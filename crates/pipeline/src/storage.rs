//! State store ports.
//!
//! [`CollaborationStore`] is the durable backing of the collaboration
//! aggregate; [`AgentDirectory`] resolves roster ids to personas. Both are
//! keyed stores with no query language.

use async_trait::async_trait;

use crate::{Agent, AgentId, Collaboration, CollaborationId, StoreError};

/// Durable key-value persistence for collaborations.
#[async_trait]
pub trait CollaborationStore: Send + Sync {
    /// Writes the full aggregate, replacing any previous version.
    ///
    /// Saving an unmodified, freshly loaded aggregate must leave the stored
    /// bytes unchanged.
    async fn save(&self, collaboration: &Collaboration) -> Result<(), StoreError>;

    /// Loads the aggregate stored under `id`.
    async fn load(&self, id: CollaborationId) -> Result<Option<Collaboration>, StoreError>;

    /// All stored collaborations, newest first.
    async fn list(&self) -> Result<Vec<Collaboration>, StoreError>;
}

/// Agent persona lookup and maintenance.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Looks up one agent.
    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError>;

    /// Writes an agent, replacing any previous version.
    async fn save_agent(&self, agent: &Agent) -> Result<(), StoreError>;

    /// All agents, newest first.
    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;

    /// Removes an agent. Fails with [`StoreError::NotFound`] if absent.
    async fn delete_agent(&self, id: &AgentId) -> Result<(), StoreError>;
}
