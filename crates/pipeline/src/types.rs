//! Shared value types for the collaboration domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the data the pipeline reads and writes: agent personas, transcript messages,
//! phase tags and timestamps. Persisted types serialise with camelCase keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, MessageId};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// One of the three fixed pipeline stages a transcript message can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The coordinator drafts the collaboration plan.
    Planning,
    /// Contributors work their part of the plan.
    Execution,
    /// The coordinator merges all contributions into the final result.
    Integration,
}

impl Phase {
    /// Returns the wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Integration => "integration",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// The part an agent plays when a roster is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Produces the plan and the integrated final result.
    Coordinator,
    /// Executes one part of the plan.
    #[default]
    Contributor,
}

/// An immutable agent persona used to parameterise completion calls.
///
/// Agents are created outside the pipeline and are read-only to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Stable identity of the agent.
    pub id: AgentId,
    /// Display name; also the transcript speaker label.
    pub name: String,
    /// What the agent does, in a sentence or two.
    #[serde(default)]
    pub description: String,
    /// Area of expertise as free text.
    pub expertise: String,
    /// Personality and communication style.
    #[serde(default)]
    pub personality: String,
    /// Persona instructions sent first on every completion call.
    pub system_prompt: String,
    /// Explicit role tag. Roster assembly falls back to name heuristics and
    /// then position when no agent carries [`AgentRole::Coordinator`].
    #[serde(default)]
    pub role: AgentRole,
    /// When the persona was created.
    pub created_at: Timestamp,
    /// When the persona was last modified.
    pub updated_at: Timestamp,
}

impl Agent {
    /// Creates a contributor persona with a fresh id.
    pub fn new(
        name: impl Into<String>,
        expertise: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: AgentId::new_random(),
            name: name.into(),
            description: String::new(),
            expertise: expertise.into(),
            personality: String::new(),
            system_prompt: system_prompt.into(),
            role: AgentRole::Contributor,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the personality.
    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    /// Sets the role tag.
    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The human requesting the work.
    User,
    /// One of the collaborating agents.
    Agent,
    /// System notices.
    System,
}

/// One entry of a collaboration transcript.
///
/// Append-only: once pushed onto a [`crate::Collaboration`] a message is never
/// mutated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message id.
    pub id: MessageId,
    /// Author kind.
    pub role: MessageRole,
    /// Message body.
    pub content: String,
    /// Authoring agent, for [`MessageRole::Agent`] messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Authoring agent's display name at the time of writing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// When the message was produced.
    pub timestamp: Timestamp,
    /// Pipeline phase that produced the message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_random(),
            role: MessageRole::User,
            content: content.into(),
            agent_id: None,
            agent_name: None,
            timestamp: Timestamp::now(),
            phase: None,
        }
    }

    /// Creates an agent message tagged with the phase that produced it.
    pub fn from_agent(agent: &Agent, content: impl Into<String>, phase: Phase) -> Self {
        Self {
            id: MessageId::new_random(),
            role: MessageRole::Agent,
            content: content.into(),
            agent_id: Some(agent.id.clone()),
            agent_name: Some(agent.name.clone()),
            timestamp: Timestamp::now(),
            phase: Some(phase),
        }
    }

    /// Speaker label used when rendering conversation context.
    pub fn speaker(&self) -> &str {
        match self.role {
            MessageRole::User => "User",
            MessageRole::System => "System",
            MessageRole::Agent => self.agent_name.as_deref().unwrap_or("Agent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_message_carries_identity_and_phase() {
        let agent = Agent::new("Writer", "copywriting", "You write.");
        let msg = Message::from_agent(&agent, "hello", Phase::Execution);

        assert_eq!(msg.role, MessageRole::Agent);
        assert_eq!(msg.agent_id.as_ref(), Some(&agent.id));
        assert_eq!(msg.speaker(), "Writer");
        assert_eq!(msg.phase, Some(Phase::Execution));
    }

    #[test]
    fn test_message_json_uses_camel_case_and_omits_empty_fields() {
        let msg = Message::user("Draft a tagline");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "user");
        assert!(json.get("agentId").is_none());
        assert!(json.get("phase").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_agent_role_defaults_to_contributor_when_absent() {
        let json = serde_json::json!({
            "id": "a1",
            "name": "Reviewer",
            "expertise": "editing",
            "systemPrompt": "You review.",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z"
        });
        let agent: Agent = serde_json::from_value(json).unwrap();
        assert_eq!(agent.role, AgentRole::Contributor);
        assert_eq!(agent.description, "");
    }

    #[test]
    fn test_phase_ordering_follows_pipeline() {
        assert!(Phase::Planning < Phase::Execution);
        assert!(Phase::Execution < Phase::Integration);
        assert_eq!(Phase::Integration.to_string(), "integration");
    }
}
