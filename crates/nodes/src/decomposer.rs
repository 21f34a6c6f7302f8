//! Task decomposition: one completion call, then decode-with-repair.

use std::sync::Arc;

use pipeline::{
    decode_breakdown, prompts, Agent, CompletionService, DecompositionOutcome,
};

/// Temperature used for decomposition requests unless configured otherwise.
pub const DEFAULT_DECOMPOSITION_TEMPERATURE: f32 = 0.3;

/// Turns a user request and roster into a per-agent assignment plan.
///
/// Never fails: service errors and unusable output resolve to the
/// deterministic fallback breakdown.
#[derive(Clone)]
pub struct TaskDecomposer {
    completion: Arc<dyn CompletionService>,
    temperature: f32,
}

impl TaskDecomposer {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            temperature: DEFAULT_DECOMPOSITION_TEMPERATURE,
        }
    }

    /// Overrides the sampling temperature of the decomposition request.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Produces exactly one assignment per agent, in roster order.
    #[tracing::instrument(skip_all, fields(agents = agents.len(), outcome = tracing::field::Empty))]
    pub async fn decompose(&self, agents: &[Agent], user_message: &str) -> DecompositionOutcome {
        let request =
            prompts::decomposition_request(agents, user_message).with_temperature(self.temperature);

        let raw = match self.completion.complete(&request).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Decomposition call failed, using fallback assignments");
                None
            }
        };

        let outcome = decode_breakdown(agents, raw.as_deref());
        tracing::Span::current().record("outcome", outcome.label());
        tracing::info!(
            outcome = outcome.label(),
            strategy = %outcome.breakdown().strategy,
            "Task decomposed"
        );
        outcome
    }
}

impl std::fmt::Debug for TaskDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDecomposer")
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{MockReply, ScriptedCompletionService};

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("Writer", "copywriting", "You write."),
            Agent::new("Reviewer", "editing", "You review."),
        ]
    }

    #[tokio::test]
    async fn test_unavailable_service_falls_back() {
        let decomposer = TaskDecomposer::new(Arc::new(ScriptedCompletionService::unavailable()));
        let agents = roster();

        let outcome = decomposer.decompose(&agents, "Draft a tagline").await;

        let DecompositionOutcome::Fallback(breakdown) = &outcome else {
            panic!("expected fallback, got {outcome:?}");
        };
        assert_eq!(breakdown.assignments.len(), 2);
        assert_eq!(breakdown.assignments[0].role, "Expert 1");
        assert_eq!(breakdown.assignments[1].role, "Expert 2");
        assert_eq!(
            breakdown.assignments[1].task,
            "Provide your expert perspective from your editing expertise"
        );
    }

    #[tokio::test]
    async fn test_fenced_output_is_parsed() {
        let fenced = "```json\n{\"strategy\":\"Split\",\"assignments\":[\
            {\"agentId\":\"a\",\"role\":\"Author\",\"task\":\"Write it\"},\
            {\"agentId\":\"b\",\"role\":\"Editor\",\"task\":\"Tighten it\"}]}\n```";
        let service = Arc::new(ScriptedCompletionService::new().otherwise(MockReply::text(fenced)));
        let decomposer = TaskDecomposer::new(service.clone()).with_temperature(0.1);
        let agents = roster();

        let outcome = decomposer.decompose(&agents, "Draft a tagline").await;

        let DecompositionOutcome::Parsed(breakdown) = &outcome else {
            panic!("expected parsed, got {outcome:?}");
        };
        assert_eq!(breakdown.strategy, "Split");
        assert_eq!(breakdown.assignments[1].role, "Editor");
        assert_eq!(breakdown.assignments[1].agent_id, agents[1].id);
        assert_eq!(service.call_count(), 1);
        assert_eq!(service.requests()[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_short_output_is_repaired() {
        let partial = r#"{"strategy":"Solo","assignments":[{"role":"Author","task":"Write it"}]}"#;
        let service = ScriptedCompletionService::new().otherwise(MockReply::text(partial));
        let decomposer = TaskDecomposer::new(Arc::new(service));

        let outcome = decomposer.decompose(&roster(), "Draft a tagline").await;

        let DecompositionOutcome::Repaired(breakdown) = &outcome else {
            panic!("expected repaired, got {outcome:?}");
        };
        assert_eq!(breakdown.assignments[0].role, "Author");
        assert_eq!(breakdown.assignments[1].role, "Expert 2");
    }
}
