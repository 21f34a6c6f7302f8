//! The collaboration aggregate: roster, append-only transcript and status.
//!
//! The transcript is the single source of truth for phase progression; there
//! are no separate counters. `final_result` is written exactly once, by
//! [`Collaboration::complete`], in the same step that moves the status to
//! [`CollaborationStatus::Completed`].

use serde::{Deserialize, Serialize};

use crate::{AgentId, CollaborationError, CollaborationId, Message, Phase, Timestamp};

/// Lifecycle status of a collaboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStatus {
    /// Accepts new pipeline runs.
    #[default]
    Active,
    /// Terminal: the integration phase produced a final result.
    Completed,
    /// Temporarily closed to new runs.
    Paused,
}

impl std::fmt::Display for CollaborationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Durable aggregate for one multi-agent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaboration {
    /// Aggregate id and state store key.
    pub id: CollaborationId,
    /// Short title.
    pub name: String,
    /// What the collaboration is about.
    pub description: String,
    selected_agents: Vec<AgentId>,
    messages: Vec<Message>,
    status: CollaborationStatus,
    /// Creation time; never changes.
    pub created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_result: Option<String>,
}

impl Collaboration {
    /// Creates an active collaboration with an empty transcript.
    ///
    /// Duplicate agent ids are dropped, keeping the first occurrence so roster
    /// order is preserved.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        selected_agents: impl IntoIterator<Item = AgentId>,
    ) -> Result<Self, CollaborationError> {
        let name = name.into();
        let description = description.into();
        if name.trim().is_empty() || description.trim().is_empty() {
            return Err(CollaborationError::InvalidCollaboration {
                message: "name and description are required".into(),
            });
        }

        let mut roster: Vec<AgentId> = Vec::new();
        for id in selected_agents {
            if !roster.contains(&id) {
                roster.push(id);
            }
        }
        if roster.is_empty() {
            return Err(CollaborationError::InvalidCollaboration {
                message: "at least one agent must be selected".into(),
            });
        }

        let now = Timestamp::now();
        Ok(Self {
            id: CollaborationId::new_random(),
            name,
            description,
            selected_agents: roster,
            messages: Vec::new(),
            status: CollaborationStatus::Active,
            created_at: now,
            updated_at: now,
            final_result: None,
        })
    }

    /// Selected agent ids in roster order.
    pub fn selected_agents(&self) -> &[AgentId] {
        &self.selected_agents
    }

    /// The transcript in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current lifecycle status.
    pub fn status(&self) -> CollaborationStatus {
        self.status
    }

    /// Time of the last mutation.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// The integrated result, present only once completed.
    pub fn final_result(&self) -> Option<&str> {
        self.final_result.as_deref()
    }

    /// Returns `true` once the terminal state has been reached.
    pub fn is_completed(&self) -> bool {
        self.status == CollaborationStatus::Completed
    }

    /// Rejects a new pipeline run unless the collaboration is active.
    pub fn ensure_accepts_runs(&self) -> Result<(), CollaborationError> {
        match self.status {
            CollaborationStatus::Active => Ok(()),
            CollaborationStatus::Completed => {
                Err(CollaborationError::AlreadyCompleted { id: self.id })
            }
            CollaborationStatus::Paused => Err(CollaborationError::InvalidCollaboration {
                message: format!("collaboration {} is paused", self.id),
            }),
        }
    }

    /// Appends a message to the transcript.
    ///
    /// Fails once the collaboration is completed; the transcript is frozen then.
    pub fn append(&mut self, message: Message) -> Result<(), CollaborationError> {
        if self.is_completed() {
            return Err(CollaborationError::AlreadyCompleted { id: self.id });
        }
        self.messages.push(message);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Appends the integration message, records it as the final result and
    /// moves to the terminal state.
    pub fn complete(&mut self, integration: Message) -> Result<(), CollaborationError> {
        if integration.phase != Some(Phase::Integration) {
            return Err(CollaborationError::InvalidCollaboration {
                message: "only an integration message can complete a collaboration".into(),
            });
        }
        let result = integration.content.clone();
        self.append(integration)?;
        self.final_result = Some(result);
        self.status = CollaborationStatus::Completed;
        Ok(())
    }

    /// Closes an active collaboration to new runs.
    pub fn pause(&mut self) -> Result<(), CollaborationError> {
        self.ensure_accepts_runs()?;
        self.status = CollaborationStatus::Paused;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Reopens a paused collaboration. Completed collaborations stay terminal.
    pub fn resume(&mut self) -> Result<(), CollaborationError> {
        match self.status {
            CollaborationStatus::Paused => {
                self.status = CollaborationStatus::Active;
                self.updated_at = Timestamp::now();
                Ok(())
            }
            CollaborationStatus::Active => Ok(()),
            CollaborationStatus::Completed => {
                Err(CollaborationError::AlreadyCompleted { id: self.id })
            }
        }
    }

    /// Messages produced by the given phase, in transcript order.
    pub fn phase_messages(&self, phase: Phase) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(move |m| m.phase == Some(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Agent;

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n).unwrap()).collect()
    }

    fn collaboration() -> Collaboration {
        Collaboration::new("Tagline", "Write a tagline", ids(&["a", "b"])).unwrap()
    }

    #[test]
    fn test_new_deduplicates_roster_preserving_order() {
        let c = Collaboration::new("n", "d", ids(&["b", "a", "b", "c", "a"])).unwrap();
        assert_eq!(c.selected_agents(), ids(&["b", "a", "c"]).as_slice());
        assert_eq!(c.status(), CollaborationStatus::Active);
        assert_eq!(c.created_at, c.updated_at());
        assert!(c.final_result().is_none());
    }

    #[test]
    fn test_new_rejects_missing_fields_and_empty_roster() {
        assert!(Collaboration::new(" ", "d", ids(&["a"])).is_err());
        assert!(Collaboration::new("n", "", ids(&["a"])).is_err());
        assert!(Collaboration::new("n", "d", Vec::new()).is_err());
    }

    #[test]
    fn test_complete_sets_final_result_and_status_together() {
        let agent = Agent::new("Lead", "coordination", "Lead.");
        let mut c = collaboration();
        c.append(Message::user("go")).unwrap();
        c.complete(Message::from_agent(&agent, "done", Phase::Integration))
            .unwrap();

        assert!(c.is_completed());
        assert_eq!(c.final_result(), Some("done"));
        assert_eq!(c.messages().last().and_then(|m| m.phase), Some(Phase::Integration));
        assert!(matches!(
            c.ensure_accepts_runs(),
            Err(CollaborationError::AlreadyCompleted { .. })
        ));
    }

    #[test]
    fn test_completed_transcript_is_frozen() {
        let agent = Agent::new("Lead", "coordination", "Lead.");
        let mut c = collaboration();
        c.complete(Message::from_agent(&agent, "done", Phase::Integration))
            .unwrap();
        let before = c.messages().len();

        assert!(c.append(Message::user("again")).is_err());
        assert!(c
            .complete(Message::from_agent(&agent, "twice", Phase::Integration))
            .is_err());
        assert_eq!(c.messages().len(), before);
        assert_eq!(c.final_result(), Some("done"));
    }

    #[test]
    fn test_complete_requires_integration_message() {
        let agent = Agent::new("Lead", "coordination", "Lead.");
        let mut c = collaboration();
        assert!(c
            .complete(Message::from_agent(&agent, "plan", Phase::Planning))
            .is_err());
        assert!(!c.is_completed());
        assert!(c.messages().is_empty());
    }

    #[test]
    fn test_pause_and_resume() {
        let mut c = collaboration();
        c.pause().unwrap();
        assert_eq!(c.status(), CollaborationStatus::Paused);
        assert!(c.ensure_accepts_runs().is_err());
        c.resume().unwrap();
        assert!(c.ensure_accepts_runs().is_ok());
    }

    #[test]
    fn test_reserialization_is_byte_identical() {
        let agent = Agent::new("Lead", "coordination", "Lead.");
        let mut c = collaboration();
        c.append(Message::user("go")).unwrap();
        c.append(Message::from_agent(&agent, "plan", Phase::Planning))
            .unwrap();

        let first = serde_json::to_string_pretty(&c).unwrap();
        let reloaded: Collaboration = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string_pretty(&reloaded).unwrap();
        assert_eq!(first, second);
    }
}
