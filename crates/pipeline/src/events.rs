//! Progress events emitted by the phase pipeline, and their SSE framing.
//!
//! Each event is framed as one `data: <JSON>\n\n` line. A stream ends with the
//! literal [`SSE_DONE`] sentinel after the `complete` event. Readers ignore any
//! line that does not start with `data: `.

use serde::{Deserialize, Serialize};

use crate::{Agent, AgentId, Message, Phase};

/// Terminal line of an event stream.
pub const SSE_DONE: &str = "data: [DONE]\n\n";

const SSE_PREFIX: &str = "data: ";

/// One progress update of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CollaborationEvent {
    /// A phase has started.
    Phase {
        /// The phase entered.
        phase: Phase,
        /// Human-readable status text.
        #[serde(rename = "message")]
        text: String,
        /// Agent leading the phase, when there is one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<AgentId>,
        /// Display name of the leading agent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
    },

    /// A contributor started its execution step.
    AgentWorking {
        /// The contributor.
        agent_id: AgentId,
        /// Display name of the contributor.
        agent_name: String,
        /// Human-readable status text.
        #[serde(rename = "message")]
        text: String,
    },

    /// A message was appended to the transcript (and already persisted).
    Message {
        /// The appended message.
        message: Message,
    },

    /// The run finished; the final result is in the last `message` event.
    Complete {
        /// Human-readable status text.
        #[serde(rename = "message")]
        text: String,
    },
}

impl CollaborationEvent {
    /// Planning started under `coordinator`.
    pub fn planning(coordinator: &Agent) -> Self {
        Self::Phase {
            phase: Phase::Planning,
            text: format!("{} is planning the collaboration...", coordinator.name),
            agent_id: Some(coordinator.id.clone()),
            agent_name: Some(coordinator.name.clone()),
        }
    }

    /// Execution started.
    pub fn execution() -> Self {
        Self::Phase {
            phase: Phase::Execution,
            text: "Agents are executing their tasks...".to_string(),
            agent_id: None,
            agent_name: None,
        }
    }

    /// Integration started under `coordinator`.
    pub fn integration(coordinator: &Agent) -> Self {
        Self::Phase {
            phase: Phase::Integration,
            text: format!("{} is integrating all contributions...", coordinator.name),
            agent_id: Some(coordinator.id.clone()),
            agent_name: Some(coordinator.name.clone()),
        }
    }

    /// `agent` started working on its part.
    pub fn agent_working(agent: &Agent) -> Self {
        Self::AgentWorking {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            text: format!("{} is working on their part...", agent.name),
        }
    }

    /// A transcript append.
    pub fn message(message: Message) -> Self {
        Self::Message { message }
    }

    /// The run completed.
    pub fn complete() -> Self {
        Self::Complete {
            text: "Collaboration completed!".to_string(),
        }
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Phase { .. } => "phase",
            Self::AgentWorking { .. } => "agent_working",
            Self::Message { .. } => "message",
            Self::Complete { .. } => "complete",
        }
    }

    /// Frames the event as one SSE `data:` line.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{SSE_PREFIX}{}\n\n", serde_json::to_string(self)?))
    }
}

/// A decoded SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// An event payload.
    Event(CollaborationEvent),
    /// The `[DONE]` sentinel.
    Done,
}

/// Decodes one line of an event stream.
///
/// Returns `None` for lines that are not `data:` lines (blank separators,
/// comments, other fields) and for payloads that are not valid events.
pub fn parse_sse_line(line: &str) -> Option<SseLine> {
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix(SSE_PREFIX)?;
    if payload.trim() == "[DONE]" {
        return Some(SseLine::Done);
    }
    serde_json::from_str(payload).ok().map(SseLine::Event)
}
