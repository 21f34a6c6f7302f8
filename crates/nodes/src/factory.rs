//! Agent persona generation from a free-text description.
//!
//! Unlike task decomposition there is no fallback: a persona the model did not
//! produce cannot be invented, so every failure is reported to the caller.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use pipeline::{
    prompts, strip_code_fences, Agent, AgentDirectory, CompletionError, CompletionService,
    StoreError,
};

/// Errors from [`AgentFactory::create_from_prompt`].
#[derive(Debug, Error)]
pub enum AgentGenerationError {
    /// The description was empty or whitespace only.
    #[error("Prompt is required")]
    EmptyPrompt,

    /// The completion call failed.
    #[error("Failed to generate agent: {0}")]
    Completion(#[from] CompletionError),

    /// The completion returned no text.
    #[error("Failed to generate agent: empty response")]
    EmptyResponse,

    /// The response was not a JSON persona.
    #[error("Failed to parse agent data: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    /// A required persona field was missing or blank.
    #[error("Generated agent is missing '{field}'")]
    MissingField {
        /// Wire name of the field.
        field: &'static str,
    },

    /// The generated agent could not be saved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedPersona {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    expertise: String,
    #[serde(default)]
    personality: String,
    #[serde(default)]
    system_prompt: String,
}

impl GeneratedPersona {
    fn into_agent(self) -> Result<Agent, AgentGenerationError> {
        for (field, value) in [
            ("name", &self.name),
            ("expertise", &self.expertise),
            ("systemPrompt", &self.system_prompt),
        ] {
            if value.trim().is_empty() {
                return Err(AgentGenerationError::MissingField { field });
            }
        }
        Ok(Agent::new(
            self.name.trim(),
            self.expertise.trim(),
            self.system_prompt.trim(),
        )
        .with_description(self.description.trim())
        .with_personality(self.personality.trim()))
    }
}

/// Generates agent personas and stores them in the agent directory.
#[derive(Clone)]
pub struct AgentFactory {
    completion: Arc<dyn CompletionService>,
    directory: Arc<dyn AgentDirectory>,
}

impl AgentFactory {
    pub fn new(completion: Arc<dyn CompletionService>, directory: Arc<dyn AgentDirectory>) -> Self {
        Self {
            completion,
            directory,
        }
    }

    /// Asks the completion service for a persona matching `prompt`, then
    /// saves it under a fresh id.
    #[tracing::instrument(skip_all, fields(agent_id = tracing::field::Empty))]
    pub async fn create_from_prompt(&self, prompt: &str) -> Result<Agent, AgentGenerationError> {
        if prompt.trim().is_empty() {
            return Err(AgentGenerationError::EmptyPrompt);
        }

        let raw = self
            .completion
            .complete(&prompts::agent_factory_request(prompt.trim()))
            .await?;
        if raw.trim().is_empty() {
            return Err(AgentGenerationError::EmptyResponse);
        }

        let persona: GeneratedPersona = serde_json::from_str(strip_code_fences(&raw))
            .map_err(|source| AgentGenerationError::Malformed { source })?;
        let agent = persona.into_agent()?;
        tracing::Span::current().record("agent_id", tracing::field::display(&agent.id));

        self.directory.save_agent(&agent).await?;
        tracing::info!(name = %agent.name, "Agent generated");
        Ok(agent)
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{MockReply, ScriptedCompletionService};
    use store::MemoryStore;

    fn build(reply: MockReply) -> (AgentFactory, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let completion = Arc::new(ScriptedCompletionService::new().otherwise(reply));
        (AgentFactory::new(completion, store.clone()), store)
    }

    #[tokio::test]
    async fn test_generated_persona_is_saved() {
        let persona = "```json\n{\"name\":\"Tagline Smith\",\"description\":\"Writes taglines\",\
            \"expertise\":\"copywriting\",\"personality\":\"Punchy\",\
            \"systemPrompt\":\"You write short taglines.\"}\n```";
        let (factory, store) = build(MockReply::text(persona));

        let agent = factory.create_from_prompt("a tagline writer").await.unwrap();

        assert_eq!(agent.name, "Tagline Smith");
        assert_eq!(agent.system_prompt, "You write short taglines.");
        assert_eq!(agent.personality, "Punchy");
        assert_eq!(store.get_agent(&agent.id).await.unwrap(), Some(agent));
    }

    #[tokio::test]
    async fn test_empty_prompt_and_garbage_are_rejected() {
        let (factory, store) = build(MockReply::text("ok"));
        assert!(matches!(
            factory.create_from_prompt("  ").await,
            Err(AgentGenerationError::EmptyPrompt)
        ));
        assert!(matches!(
            factory.create_from_prompt("writer").await,
            Err(AgentGenerationError::Malformed { .. })
        ));
        assert!(store.list_agents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_system_prompt_is_rejected() {
        let (factory, _) = build(MockReply::text(r#"{"name":"Writer","expertise":"copy"}"#));
        assert!(matches!(
            factory.create_from_prompt("writer").await,
            Err(AgentGenerationError::MissingField { field: "systemPrompt" })
        ));
    }

    #[tokio::test]
    async fn test_service_failure_is_reported() {
        let (factory, store) = build(MockReply::unavailable());
        assert!(matches!(
            factory.create_from_prompt("writer").await,
            Err(AgentGenerationError::Completion(_))
        ));
        assert!(store.list_agents().await.unwrap().is_empty());
    }
}
