//! Roster assembly and coordinator selection.
//!
//! The coordinator is decided once, when the roster is assembled, and recorded
//! as an explicit [`AgentRole`] tag on the roster's copy of each agent. Selection
//! order:
//!
//! 1. the first agent already tagged [`AgentRole::Coordinator`];
//! 2. the first agent whose name mentions "coordinator" or whose expertise
//!    mentions "coordination" (case-insensitive);
//! 3. the first agent in roster order.

use crate::{Agent, AgentRole, CollaborationError};

/// Returns the roster position of the coordinator, or `None` for an empty roster.
pub fn select_coordinator(agents: &[Agent]) -> Option<usize> {
    if agents.is_empty() {
        return None;
    }
    agents
        .iter()
        .position(|a| a.role == AgentRole::Coordinator)
        .or_else(|| agents.iter().position(mentions_coordination))
        .or(Some(0))
}

fn mentions_coordination(agent: &Agent) -> bool {
    agent.name.to_lowercase().contains("coordinator")
        || agent.expertise.to_lowercase().contains("coordination")
}

/// The resolved, ordered set of agents taking part in one run.
#[derive(Debug, Clone)]
pub struct Roster {
    agents: Vec<Agent>,
    coordinator: usize,
}

impl Roster {
    /// Assembles a roster from already-resolved agents, in collaboration order.
    ///
    /// Fails with [`CollaborationError::NoAgents`] when `agents` is empty.
    pub fn assemble(mut agents: Vec<Agent>) -> Result<Self, CollaborationError> {
        let coordinator = select_coordinator(&agents).ok_or(CollaborationError::NoAgents)?;
        for (position, agent) in agents.iter_mut().enumerate() {
            agent.role = if position == coordinator {
                AgentRole::Coordinator
            } else {
                AgentRole::Contributor
            };
        }
        Ok(Self {
            agents,
            coordinator,
        })
    }

    /// All agents in roster order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Number of agents, coordinator included.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Always `false`; an assembled roster holds at least one agent.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The designated coordinator.
    pub fn coordinator(&self) -> &Agent {
        &self.agents[self.coordinator]
    }

    /// Every agent except the coordinator, with its roster position.
    pub fn contributors(&self) -> impl Iterator<Item = (usize, &Agent)> {
        let coordinator = self.coordinator;
        self.agents
            .iter()
            .enumerate()
            .filter(move |(position, _)| *position != coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, expertise: &str) -> Agent {
        Agent::new(name, expertise, format!("You are {name}."))
    }

    #[test]
    fn test_defaults_to_first_agent() {
        let agents = vec![agent("Writer", "copy"), agent("Reviewer", "editing")];
        assert_eq!(select_coordinator(&agents), Some(0));
        assert_eq!(select_coordinator(&[]), None);
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let agents = vec![
            agent("Writer", "copy"),
            agent("Reviewer", "editing"),
            agent("Project COORDINATOR", "planning"),
        ];
        assert_eq!(select_coordinator(&agents), Some(2));
    }

    #[test]
    fn test_expertise_match() {
        let agents = vec![agent("Writer", "copy"), agent("Lead", "Team Coordination")];
        assert_eq!(select_coordinator(&agents), Some(1));
    }

    #[test]
    fn test_explicit_tag_wins_over_heuristics() {
        let agents = vec![
            agent("Coordinator", "coordination"),
            agent("Editor", "editing").with_role(AgentRole::Coordinator),
        ];
        assert_eq!(select_coordinator(&agents), Some(1));
    }

    #[test]
    fn test_assemble_tags_roles_and_lists_contributors() {
        let roster = Roster::assemble(vec![
            agent("Writer", "copy"),
            agent("Coordinator", "planning"),
            agent("Reviewer", "editing"),
        ])
        .unwrap();

        assert_eq!(roster.coordinator().name, "Coordinator");
        assert_eq!(roster.coordinator().role, AgentRole::Coordinator);
        let contributors: Vec<_> = roster
            .contributors()
            .map(|(i, a)| (i, a.name.as_str()))
            .collect();
        assert_eq!(contributors, vec![(0, "Writer"), (2, "Reviewer")]);
        assert!(roster
            .contributors()
            .all(|(_, a)| a.role == AgentRole::Contributor));
    }

    #[test]
    fn test_assemble_rejects_empty_roster() {
        assert!(matches!(
            Roster::assemble(Vec::new()),
            Err(CollaborationError::NoAgents)
        ));
    }
}
