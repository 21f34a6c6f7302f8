//! Task breakdown model and the decode-with-repair step for model output.
//!
//! The decomposer asks the completion service for a JSON object of the shape
//!
//! ```json
//! { "strategy": "...", "assignments": [ { "agentId": "...", "role": "...", "task": "..." } ] }
//! ```
//!
//! and hands the raw text to [`decode_breakdown`]. Decoding never fails: the
//! result is always a [`TaskBreakdown`] with exactly one assignment per roster
//! agent, tagged with how much of the model output survived.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Agent, AgentId};

/// Strategy text used whenever the model did not supply one.
pub const FALLBACK_STRATEGY: &str = "Basic task distribution";

/// One agent's role and instruction for the execution phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    /// Agent the assignment belongs to.
    pub agent_id: AgentId,
    /// Short role label (e.g. "Researcher").
    pub role: String,
    /// Free-text instruction.
    pub task: String,
}

/// Per-agent plan, positionally aligned with the roster it was decoded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBreakdown {
    /// Overall collaboration strategy.
    pub strategy: String,
    /// One assignment per roster agent, in roster order.
    pub assignments: Vec<TaskAssignment>,
}

impl TaskBreakdown {
    /// Assignment for the agent at `position` in the roster.
    pub fn assignment(&self, position: usize) -> Option<&TaskAssignment> {
        self.assignments.get(position)
    }
}

/// How a breakdown was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompositionOutcome {
    /// Every assignment came from the model output as-is.
    Parsed(TaskBreakdown),
    /// The model output was usable but incomplete; gaps were filled positionally.
    Repaired(TaskBreakdown),
    /// No usable model output; the deterministic default plan was used.
    Fallback(TaskBreakdown),
}

impl DecompositionOutcome {
    /// Borrows the breakdown regardless of outcome.
    pub fn breakdown(&self) -> &TaskBreakdown {
        match self {
            Self::Parsed(b) | Self::Repaired(b) | Self::Fallback(b) => b,
        }
    }

    /// Consumes the outcome, returning the breakdown.
    pub fn into_breakdown(self) -> TaskBreakdown {
        match self {
            Self::Parsed(b) | Self::Repaired(b) | Self::Fallback(b) => b,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Parsed(_) => "parsed",
            Self::Repaired(_) => "repaired",
            Self::Fallback(_) => "fallback",
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Role given to the agent at zero-based `position` when none was supplied.
pub fn fallback_role(position: usize) -> String {
    format!("Expert {}", position + 1)
}

/// Task given to `agent` when none was supplied.
pub fn fallback_task(agent: &Agent) -> String {
    format!(
        "Provide your expert perspective from your {} expertise",
        agent.expertise
    )
}

/// The deterministic default plan. Pure and total.
pub fn fallback_breakdown(agents: &[Agent]) -> TaskBreakdown {
    TaskBreakdown {
        strategy: FALLBACK_STRATEGY.to_string(),
        assignments: agents
            .iter()
            .enumerate()
            .map(|(position, agent)| TaskAssignment {
                agent_id: agent.id.clone(),
                role: fallback_role(position),
                task: fallback_task(agent),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Removes a surrounding Markdown code fence (with or without a language tag).
///
/// Text without a leading fence is returned trimmed but otherwise unchanged.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Decodes model output into a breakdown for `agents`.
///
/// - `None`, blank text, invalid JSON, a non-object, or a missing/non-array
///   `assignments` field yields [`DecompositionOutcome::Fallback`].
/// - Otherwise each roster position keeps the model's non-blank `role` and
///   `task` for the same index and fills anything missing from the fallback.
///   A wrong assignment count or any filled field yields
///   [`DecompositionOutcome::Repaired`].
///
/// Assignment agent ids always come from the roster, never the model.
pub fn decode_breakdown(agents: &[Agent], raw: Option<&str>) -> DecompositionOutcome {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return DecompositionOutcome::Fallback(fallback_breakdown(agents));
    };

    let value: Value = match serde_json::from_str(strip_code_fences(raw)) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Task breakdown is not valid JSON");
            return DecompositionOutcome::Fallback(fallback_breakdown(agents));
        }
    };

    let Some(proposed) = value.get("assignments").and_then(Value::as_array) else {
        return DecompositionOutcome::Fallback(fallback_breakdown(agents));
    };

    let mut repaired = proposed.len() != agents.len();
    let mut assignments = Vec::with_capacity(agents.len());
    for (position, agent) in agents.iter().enumerate() {
        let entry = proposed.get(position);
        let role = non_blank_field(entry, "role");
        let task = non_blank_field(entry, "task");
        repaired |= role.is_none() || task.is_none();

        assignments.push(TaskAssignment {
            agent_id: agent.id.clone(),
            role: role.unwrap_or_else(|| fallback_role(position)),
            task: task.unwrap_or_else(|| fallback_task(agent)),
        });
    }

    let strategy = non_blank_field(Some(&value), "strategy")
        .unwrap_or_else(|| FALLBACK_STRATEGY.to_string());

    let breakdown = TaskBreakdown {
        strategy,
        assignments,
    };
    if repaired {
        DecompositionOutcome::Repaired(breakdown)
    } else {
        DecompositionOutcome::Parsed(breakdown)
    }
}

fn non_blank_field(entry: Option<&Value>, key: &str) -> Option<String> {
    entry
        .and_then(|e| e.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("Writer", "copywriting", "You write."),
            Agent::new("Reviewer", "editing", "You review."),
        ]
    }

    #[test]
    fn test_missing_output_falls_back() {
        let agents = roster();
        let outcome = decode_breakdown(&agents, None);

        let DecompositionOutcome::Fallback(b) = outcome else {
            panic!("expected fallback");
        };
        assert_eq!(b.strategy, FALLBACK_STRATEGY);
        assert_eq!(b.assignments[0].role, "Expert 1");
        assert_eq!(b.assignments[1].role, "Expert 2");
        assert_eq!(
            b.assignments[1].task,
            "Provide your expert perspective from your editing expertise"
        );
        assert_eq!(b.assignments[0].agent_id, agents[0].id);
    }

    #[test]
    fn test_garbage_falls_back() {
        let agents = roster();
        for raw in ["", "   ", "not json", "[1,2]", "{\"strategy\":\"x\"}", "```\n```"] {
            let outcome = decode_breakdown(&agents, Some(raw));
            assert_eq!(outcome.label(), "fallback", "input: {raw:?}");
            assert_eq!(outcome.breakdown().assignments.len(), 2);
        }
    }

    #[test]
    fn test_fenced_output_parses_without_fallback() {
        let agents = roster();
        let raw = "```json\n{\"strategy\":\"Split the work\",\"assignments\":[\
            {\"agentId\":\"w\",\"role\":\"Author\",\"task\":\"Write three options\"},\
            {\"agentId\":\"r\",\"role\":\"Critic\",\"task\":\"Pick the best\"}]}\n```";

        let outcome = decode_breakdown(&agents, Some(raw));
        let DecompositionOutcome::Parsed(b) = &outcome else {
            panic!("expected parsed, got {outcome:?}");
        };
        assert_eq!(b.strategy, "Split the work");
        assert_eq!(b.assignments[0].role, "Author");
        assert_eq!(b.assignments[1].task, "Pick the best");
        // ids are realigned to the roster
        assert_eq!(b.assignments[1].agent_id, agents[1].id);
    }

    #[test]
    fn test_short_assignment_list_is_repaired_positionally() {
        let agents = roster();
        let raw = r#"{"strategy":"s","assignments":[{"role":"Author","task":""}]}"#;

        let outcome = decode_breakdown(&agents, Some(raw));
        let DecompositionOutcome::Repaired(b) = outcome else {
            panic!("expected repaired");
        };
        assert_eq!(b.assignments.len(), 2);
        assert_eq!(b.assignments[0].role, "Author");
        assert_eq!(
            b.assignments[0].task,
            "Provide your expert perspective from your copywriting expertise"
        );
        assert_eq!(b.assignments[1].role, "Expert 2");
    }

    #[test]
    fn test_extra_assignments_are_dropped_and_marked_repaired() {
        let agents = roster();
        let raw = r#"{"assignments":[
            {"role":"A","task":"a"},{"role":"B","task":"b"},{"role":"C","task":"c"}]}"#;

        let outcome = decode_breakdown(&agents, Some(raw));
        assert_eq!(outcome.label(), "repaired");
        let b = outcome.into_breakdown();
        assert_eq!(b.strategy, FALLBACK_STRATEGY);
        assert_eq!(
            b.assignments.iter().map(|a| a.role.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json{}```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn agents(count: usize) -> Vec<Agent> {
            (0..count)
                .map(|i| Agent::new(format!("Agent {i}"), format!("field {i}"), "Help."))
                .collect()
        }

        proptest! {
            /// Property: every decode yields one assignment per roster agent,
            /// aligned by position, whatever the model returned.
            #[test]
            fn prop_assignment_count_matches_roster(
                raw in proptest::option::of(".{0,200}"),
                count in 0usize..6,
            ) {
                let agents = agents(count);
                let outcome = decode_breakdown(&agents, raw.as_deref());
                let b = outcome.breakdown();

                prop_assert_eq!(b.assignments.len(), agents.len());
                for (a, agent) in b.assignments.iter().zip(&agents) {
                    prop_assert_eq!(&a.agent_id, &agent.id);
                    prop_assert!(!a.role.is_empty());
                    prop_assert!(!a.task.is_empty());
                }
            }

            /// Property: structurally valid JSON with arbitrary assignment
            /// arrays is still aligned to the roster.
            #[test]
            fn prop_json_arrays_of_any_length_are_aligned(
                roles in proptest::collection::vec("[A-Za-z ]{0,12}", 0..8),
                count in 1usize..5,
            ) {
                let agents = agents(count);
                let entries: Vec<Value> = roles
                    .iter()
                    .map(|r| serde_json::json!({ "role": r, "task": "t" }))
                    .collect();
                let raw = serde_json::json!({ "strategy": "s", "assignments": entries }).to_string();

                let outcome = decode_breakdown(&agents, Some(&raw));
                prop_assert_ne!(outcome.label(), "fallback");
                prop_assert_eq!(outcome.breakdown().assignments.len(), count);
            }
        }
    }
}
