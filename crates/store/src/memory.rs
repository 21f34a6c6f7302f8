//! In-process store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use pipeline::{
    Agent, AgentDirectory, AgentId, Collaboration, CollaborationId, CollaborationStore,
    StoreError,
};

/// Holds agents and collaborations in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collaborations: RwLock<HashMap<CollaborationId, Collaboration>>,
    agents: RwLock<HashMap<AgentId, Agent>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `agents`.
    pub fn with_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        let map = agents.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            agents: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Number of collaboration saves performed so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollaborationStore for MemoryStore {
    async fn save(&self, collaboration: &Collaboration) -> Result<(), StoreError> {
        self.collaborations
            .write()
            .await
            .insert(collaboration.id, collaboration.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, id: CollaborationId) -> Result<Option<Collaboration>, StoreError> {
        Ok(self.collaborations.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Collaboration>, StoreError> {
        let mut all: Vec<Collaboration> =
            self.collaborations.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[async_trait]
impl AgentDirectory for MemoryStore {
    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.read().await.get(id).cloned())
    }

    async fn save_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        self.agents
            .write()
            .await
            .insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let mut all: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_agent(&self, id: &AgentId) -> Result<(), StoreError> {
        self.agents
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collaborations_are_listed_newest_first() {
        let store = MemoryStore::new();
        let writer = Agent::new("Writer", "copy", "Write.");
        let first = Collaboration::new("One", "first", [writer.id.clone()]).unwrap();
        let second = Collaboration::new("Two", "second", [writer.id.clone()]).unwrap();
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at >= listed[1].created_at);
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_agent_directory() {
        let writer = Agent::new("Writer", "copy", "Write.");
        let store = MemoryStore::with_agents([writer.clone()]);

        assert_eq!(store.get_agent(&writer.id).await.unwrap(), Some(writer.clone()));
        store.delete_agent(&writer.id).await.unwrap();
        assert!(matches!(
            store.delete_agent(&writer.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.list_agents().await.unwrap().is_empty());
    }
}
