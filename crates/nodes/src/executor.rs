//! The phase pipeline: Planning → Executing → Integrating → Done.
//!
//! One [`PhaseExecutor::run`] call walks the stages once, in order. Every
//! transcript append is persisted before the matching event is emitted, so a
//! consumer never sees a message the store does not have.
//!
//! The Execution stage fans out one completion call per contributor, bounded
//! by a semaphore, and joins all of them before Integration starts. Results
//! pass through a reorder buffer keyed by roster slot so `message` events
//! leave in roster order whatever order the calls finish in.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use pipeline::breakdown::{fallback_role, fallback_task};
use pipeline::{
    prompts, render_context, Agent, AgentId, Collaboration, CollaborationError,
    CollaborationEvent, CollaborationStore, CompletionRequest, CompletionService, Message,
    Phase, Roster, StoreError, TaskAssignment, TaskBreakdown, DEFAULT_CONTEXT_WINDOW,
};

use crate::decomposer::{TaskDecomposer, DEFAULT_DECOMPOSITION_TEMPERATURE};
use crate::emitter::{Cancelled, EventEmitter};

// ---------------------------------------------------------------------------
// Settings and outcome
// ---------------------------------------------------------------------------

/// Tunables for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    /// Upper bound on concurrent execution-phase calls.
    pub max_concurrency: usize,
    /// Number of trailing transcript messages rendered as context.
    pub context_window: usize,
    /// Sampling temperature of the decomposition call.
    pub decomposition_temperature: f32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            context_window: DEFAULT_CONTEXT_WINDOW,
            decomposition_temperature: DEFAULT_DECOMPOSITION_TEMPERATURE,
        }
    }
}

/// Position of a run in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Planning,
    Executing,
    Integrating,
    Done,
}

impl Stage {
    /// The next stage. `Done` is absorbing.
    pub fn advance(self) -> Self {
        match self {
            Self::Planning => Self::Executing,
            Self::Executing => Self::Integrating,
            Self::Integrating | Self::Done => Self::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Integrating => "integrating",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Integration finished; the collaboration is completed and persisted.
    Completed,
    /// The event consumer went away during `stage`. No later stage started and
    /// the persisted transcript holds everything emitted so far.
    Cancelled { stage: Stage },
}

// ---------------------------------------------------------------------------
// Internal control flow
// ---------------------------------------------------------------------------

enum Interrupt {
    Cancelled,
    Failed(CollaborationError),
}

impl From<Cancelled> for Interrupt {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<CollaborationError> for Interrupt {
    fn from(e: CollaborationError) -> Self {
        Self::Failed(e)
    }
}

impl From<StoreError> for Interrupt {
    fn from(e: StoreError) -> Self {
        Self::Failed(e.into())
    }
}

/// Working state of one run.
struct Run<'a> {
    collaboration: &'a mut Collaboration,
    roster: &'a Roster,
    user_message: &'a str,
    emitter: &'a EventEmitter,
    breakdown: TaskBreakdown,
    plan: String,
    /// Execution responses as (roster position, text), in roster order.
    contributions: Vec<(usize, String)>,
}

// ---------------------------------------------------------------------------
// PhaseExecutor
// ---------------------------------------------------------------------------

/// Drives a collaboration through the three phases.
#[derive(Clone)]
pub struct PhaseExecutor {
    completion: Arc<dyn CompletionService>,
    store: Arc<dyn CollaborationStore>,
    decomposer: TaskDecomposer,
    settings: RunSettings,
}

impl PhaseExecutor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        store: Arc<dyn CollaborationStore>,
        settings: RunSettings,
    ) -> Self {
        let decomposer = TaskDecomposer::new(Arc::clone(&completion))
            .with_temperature(settings.decomposition_temperature);
        Self {
            completion,
            store,
            decomposer,
            settings,
        }
    }

    /// Runs Planning, Execution and Integration once for `user_message`.
    ///
    /// The caller has already validated input, appended and persisted the user
    /// message. Completion failures degrade to empty responses; only store
    /// failures end the run with an error.
    #[tracing::instrument(
        skip_all,
        fields(
            collaboration_id = %collaboration.id,
            coordinator = %roster.coordinator().id,
            agents = roster.len(),
        )
    )]
    pub async fn run(
        &self,
        collaboration: &mut Collaboration,
        roster: &Roster,
        user_message: &str,
        emitter: &EventEmitter,
    ) -> Result<RunOutcome, CollaborationError> {
        let mut run = Run {
            collaboration,
            roster,
            user_message,
            emitter,
            breakdown: TaskBreakdown {
                strategy: String::new(),
                assignments: Vec::new(),
            },
            plan: String::new(),
            contributions: Vec::new(),
        };

        let mut stage = Stage::Planning;
        loop {
            tracing::debug!(stage = %stage, "Entering stage");
            let step = match stage {
                Stage::Planning => self.plan(&mut run).await,
                Stage::Executing => self.execute(&mut run).await,
                Stage::Integrating => self.integrate(&mut run).await,
                Stage::Done => {
                    tracing::info!(outcome = "completed", "Collaboration run finished");
                    return Ok(RunOutcome::Completed);
                }
            };
            match step {
                Ok(()) => stage = stage.advance(),
                Err(Interrupt::Cancelled) => {
                    tracing::info!(stage = %stage, outcome = "cancelled", "Run cancelled by consumer");
                    return Ok(RunOutcome::Cancelled { stage });
                }
                Err(Interrupt::Failed(e)) => {
                    tracing::error!(stage = %stage, error = %e, "Run aborted");
                    return Err(e);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn plan(&self, run: &mut Run<'_>) -> Result<(), Interrupt> {
        let roster = run.roster;
        let coordinator = roster.coordinator();
        run.emitter
            .emit(CollaborationEvent::planning(coordinator))
            .await?;

        run.breakdown = self
            .decomposer
            .decompose(roster.agents(), run.user_message)
            .await
            .into_breakdown();

        let conversation = self.conversation(run.collaboration);
        let prompt =
            prompts::planning_prompt(run.user_message, roster, &run.breakdown, &conversation);
        let request = prompts::persona_request(coordinator, None, &prompt);
        run.plan = respond(self.completion.as_ref(), &request, &coordinator.id, Phase::Planning).await;

        let message = Message::from_agent(coordinator, run.plan.clone(), Phase::Planning);
        self.publish(run, message).await
    }

    async fn execute(&self, run: &mut Run<'_>) -> Result<(), Interrupt> {
        let roster = run.roster;
        run.emitter.emit(CollaborationEvent::execution()).await?;

        let contributors: Vec<(usize, &Agent)> = roster.contributors().collect();
        if contributors.is_empty() {
            return Ok(());
        }

        // One snapshot shared by every contributor.
        let conversation = self.conversation(run.collaboration);
        let pool = self.settings.max_concurrency.clamp(1, contributors.len());
        let semaphore = Arc::new(Semaphore::new(pool));
        let mut tasks = JoinSet::new();

        for (slot, &(position, agent)) in contributors.iter().enumerate() {
            run.emitter
                .emit(CollaborationEvent::agent_working(agent))
                .await?;

            let assignment = run
                .breakdown
                .assignment(position)
                .cloned()
                .unwrap_or_else(|| TaskAssignment {
                    agent_id: agent.id.clone(),
                    role: fallback_role(position),
                    task: fallback_task(agent),
                });
            let context = prompts::execution_context(
                agent,
                &assignment,
                roster,
                &run.breakdown,
                &run.plan,
                run.user_message,
                &conversation,
            );
            let request = prompts::persona_request(agent, Some(&context), run.user_message);

            let completion = Arc::clone(&self.completion);
            let semaphore = Arc::clone(&semaphore);
            let agent_id = agent.id.clone();
            tasks.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let text =
                        respond(completion.as_ref(), &request, &agent_id, Phase::Execution).await;
                    (slot, text)
                }
                .in_current_span(),
            );
        }

        // Reorder buffer: publish slot `next` only once every earlier slot is out.
        let mut pending: BTreeMap<usize, String> = BTreeMap::new();
        let mut next = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, text)) => {
                    pending.insert(slot, text);
                }
                Err(e) => tracing::warn!(error = %e, "Execution task did not finish"),
            }
            while let Some(text) = pending.remove(&next) {
                let (position, agent) = contributors[next];
                self.publish_contribution(run, position, agent, text).await?;
                next += 1;
            }
        }

        // Slots whose task died are published as empty responses.
        while next < contributors.len() {
            let (position, agent) = contributors[next];
            let text = pending.remove(&next).unwrap_or_default();
            self.publish_contribution(run, position, agent, text).await?;
            next += 1;
        }
        Ok(())
    }

    async fn integrate(&self, run: &mut Run<'_>) -> Result<(), Interrupt> {
        let roster = run.roster;
        let coordinator = roster.coordinator();
        run.emitter
            .emit(CollaborationEvent::integration(coordinator))
            .await?;

        let contributions: Vec<(&Agent, &str)> = run
            .contributions
            .iter()
            .filter_map(|(position, text)| {
                roster.agents().get(*position).map(|a| (a, text.as_str()))
            })
            .collect();
        let prompt = prompts::integration_prompt(run.user_message, &run.plan, &contributions);
        let conversation = self.conversation(run.collaboration);
        let request = prompts::persona_request(coordinator, Some(&conversation), &prompt);
        let text =
            respond(self.completion.as_ref(), &request, &coordinator.id, Phase::Integration).await;

        let message = Message::from_agent(coordinator, text, Phase::Integration);
        run.collaboration.complete(message.clone())?;
        self.store.save(run.collaboration).await?;
        run.emitter.emit(CollaborationEvent::message(message)).await?;
        run.emitter.emit(CollaborationEvent::complete()).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn conversation(&self, collaboration: &Collaboration) -> String {
        let rendered = render_context(collaboration.messages(), self.settings.context_window);
        if rendered.is_empty() {
            rendered
        } else {
            format!("Previous messages in this collaboration:\n{rendered}")
        }
    }

    async fn publish_contribution(
        &self,
        run: &mut Run<'_>,
        position: usize,
        agent: &Agent,
        text: String,
    ) -> Result<(), Interrupt> {
        let message = Message::from_agent(agent, text.clone(), Phase::Execution);
        run.contributions.push((position, text));
        self.publish(run, message).await
    }

    /// Append, persist, then notify.
    async fn publish(&self, run: &mut Run<'_>, message: Message) -> Result<(), Interrupt> {
        run.collaboration.append(message.clone())?;
        self.store.save(run.collaboration).await?;
        run.emitter.emit(CollaborationEvent::message(message)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for PhaseExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseExecutor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// One persona call. Failures are logged and become an empty response.
async fn respond(
    completion: &dyn CompletionService,
    request: &CompletionRequest,
    agent_id: &AgentId,
    phase: Phase,
) -> String {
    match completion.complete(request).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                agent_id = %agent_id,
                phase = %phase,
                error = %e,
                retryable = e.retry_policy().is_retryable(),
                "Completion failed, continuing with an empty response"
            );
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{MockReply, ScriptedCompletionService};
    use pipeline::CollaborationStatus;
    use store::MemoryStore;

    fn agents() -> Vec<Agent> {
        vec![
            Agent::new("Lead Coordinator", "coordination", "You coordinate."),
            Agent::new("Writer", "copywriting", "You write."),
        ]
    }

    fn collaboration(agents: &[Agent]) -> Collaboration {
        let mut c = Collaboration::new("Tagline", "Write a tagline", agents.iter().map(|a| a.id.clone()))
            .unwrap();
        c.append(Message::user("Draft a tagline")).unwrap();
        c
    }

    #[test]
    fn test_stage_advances_forward_only() {
        assert_eq!(Stage::Planning.advance(), Stage::Executing);
        assert_eq!(Stage::Executing.advance(), Stage::Integrating);
        assert_eq!(Stage::Integrating.advance(), Stage::Done);
        assert_eq!(Stage::Done.advance(), Stage::Done);
    }

    #[tokio::test]
    async fn test_run_without_consumer_is_cancelled_before_any_append() {
        let agents = agents();
        let roster = Roster::assemble(agents.clone()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let completion = Arc::new(ScriptedCompletionService::new());
        let executor = PhaseExecutor::new(completion.clone(), store.clone(), RunSettings::default());
        let mut c = collaboration(&agents);
        let (emitter, rx) = EventEmitter::channel(8);
        drop(rx);

        let outcome = executor.run(&mut c, &roster, "Draft a tagline", &emitter).await.unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled { stage: Stage::Planning });
        assert_eq!(c.messages().len(), 1);
        assert_eq!(c.status(), CollaborationStatus::Active);
        assert_eq!(completion.call_count(), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_after_plan_stops_before_integration() {
        let agents = agents();
        let roster = Roster::assemble(agents.clone()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let completion = Arc::new(
            ScriptedCompletionService::new()
                .when_contains("collaboration plan", MockReply::text("The plan")),
        );
        let executor = PhaseExecutor::new(completion, store.clone(), RunSettings::default());
        let mut c = collaboration(&agents);
        let (emitter, mut rx) = EventEmitter::channel(1);

        let consumer = async move {
            while let Some(event) = rx.recv().await {
                if event.kind() == "message" {
                    break;
                }
            }
        };
        let (outcome, ()) = tokio::join!(
            executor.run(&mut c, &roster, "Draft a tagline", &emitter),
            consumer
        );

        assert_eq!(outcome.unwrap(), RunOutcome::Cancelled { stage: Stage::Executing });
        assert!(!c.is_completed());
        assert!(c.final_result().is_none());
        assert_eq!(c.phase_messages(Phase::Execution).count(), 0);

        let stored = store.load(c.id).await.unwrap().unwrap();
        assert_eq!(stored.messages().len(), 2);
        assert_eq!(stored.messages()[1].content, "The plan");
    }

    #[tokio::test]
    async fn test_single_agent_roster_integrates_without_contributors() {
        let solo = vec![Agent::new("Writer", "copywriting", "You write.")];
        let roster = Roster::assemble(solo.clone()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let completion = Arc::new(
            ScriptedCompletionService::new()
                .when_contains("integrate them", MockReply::text("Final")),
        );
        let executor = PhaseExecutor::new(completion.clone(), store, RunSettings::default());
        let mut c = collaboration(&solo);
        let (emitter, mut rx) = EventEmitter::channel(16);

        let outcome = executor.run(&mut c, &roster, "Draft a tagline", &emitter).await.unwrap();
        drop(emitter);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind());
        }
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            kinds,
            ["phase", "message", "phase", "phase", "message", "complete"]
        );
        assert_eq!(c.final_result(), Some("Final"));
        // decomposition, plan, integration
        assert_eq!(completion.call_count(), 3);
    }
}
