//! Entry point for callers: collaboration creation, lookup and message runs.

use std::sync::Arc;

use pipeline::{
    AgentDirectory, AgentId, Collaboration, CollaborationError, CollaborationId,
    CollaborationStore, CompletionService, Message, PipelineRunId, Roster, StoreError,
};

use crate::emitter::EventEmitter;
use crate::executor::{PhaseExecutor, RunOutcome, RunSettings};

/// Validates requests and hands accepted ones to the [`PhaseExecutor`].
///
/// At most one run per collaboration may be active at a time; callers
/// serialize runs against the same id.
#[derive(Clone)]
pub struct CollaborationService {
    store: Arc<dyn CollaborationStore>,
    agents: Arc<dyn AgentDirectory>,
    executor: PhaseExecutor,
}

impl CollaborationService {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        store: Arc<dyn CollaborationStore>,
        agents: Arc<dyn AgentDirectory>,
        settings: RunSettings,
    ) -> Self {
        let executor = PhaseExecutor::new(completion, Arc::clone(&store), settings);
        Self {
            store,
            agents,
            executor,
        }
    }

    /// Creates and persists an active collaboration.
    #[tracing::instrument(
        skip(self, description, agent_ids),
        fields(collaboration_id = tracing::field::Empty)
    )]
    pub async fn create_collaboration(
        &self,
        name: &str,
        description: &str,
        agent_ids: Vec<AgentId>,
    ) -> Result<Collaboration, CollaborationError> {
        let collaboration = Collaboration::new(name.trim(), description.trim(), agent_ids)?;
        tracing::Span::current().record("collaboration_id", tracing::field::display(collaboration.id));
        self.store.save(&collaboration).await?;
        tracing::info!(
            agents = collaboration.selected_agents().len(),
            "Collaboration created"
        );
        Ok(collaboration)
    }

    /// All collaborations, newest first.
    pub async fn list_collaborations(&self) -> Result<Vec<Collaboration>, CollaborationError> {
        Ok(self.store.list().await?)
    }

    /// Looks up one collaboration.
    pub async fn get_collaboration(
        &self,
        id: CollaborationId,
    ) -> Result<Collaboration, CollaborationError> {
        self.store
            .load(id)
            .await?
            .ok_or(CollaborationError::CollaborationNotFound { id })
    }

    /// Starts a pipeline run for a new user message.
    ///
    /// Input errors are returned before anything is appended or emitted. Once
    /// accepted, the user message is appended and persisted, and the run
    /// proceeds through all phases, streaming events to `emitter`. The emitter
    /// is dropped when the run ends, which closes the consumer's stream.
    #[tracing::instrument(
        skip_all,
        fields(collaboration_id = %id, run_id = %PipelineRunId::new_random())
    )]
    pub async fn send_message(
        &self,
        id: CollaborationId,
        message: &str,
        emitter: EventEmitter,
    ) -> Result<RunOutcome, CollaborationError> {
        if message.trim().is_empty() {
            return Err(CollaborationError::EmptyMessage);
        }

        let mut collaboration = self.get_collaboration(id).await?;
        collaboration.ensure_accepts_runs()?;
        let roster = self.resolve_roster(&collaboration).await?;

        collaboration.append(Message::user(message))?;
        self.store.save(&collaboration).await?;

        self.executor
            .run(&mut collaboration, &roster, message, &emitter)
            .await
    }

    /// Resolves the selected agents in collaboration order, skipping any the
    /// directory no longer knows or can no longer decode. Storage I/O failures
    /// still abort.
    async fn resolve_roster(
        &self,
        collaboration: &Collaboration,
    ) -> Result<Roster, CollaborationError> {
        let mut agents = Vec::with_capacity(collaboration.selected_agents().len());
        for agent_id in collaboration.selected_agents() {
            match self.agents.get_agent(agent_id).await {
                Ok(Some(agent)) => agents.push(agent),
                Ok(None) => {
                    tracing::warn!(agent_id = %agent_id, "Selected agent not found, skipping")
                }
                Err(e @ StoreError::Serialization { .. }) => {
                    tracing::warn!(
                        agent_id = %agent_id,
                        error = %e,
                        "Selected agent record is unreadable, skipping"
                    )
                }
                Err(e) => return Err(e.into()),
            }
        }
        Roster::assemble(agents)
    }
}

impl std::fmt::Debug for CollaborationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaborationService")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
