//! Prompt construction for every completion call the pipeline makes.
//!
//! Builders are pure: they take domain values and return either prompt text or
//! a ready [`CompletionRequest`]. Persona calls always send the agent's system
//! prompt first, then an optional context block, then the task.

use crate::{Agent, CompletionRequest, Roster, TaskAssignment, TaskBreakdown};

const DECOMPOSITION_SYSTEM: &str =
    "You are an expert in team coordination and task distribution. Return only valid JSON.";

const AGENT_FACTORY_SYSTEM: &str = "\
You are an AI assistant that creates specialized AI agents.
Given a description, you create an AI agent with the following properties:
- name: A short, descriptive name for the agent (max 50 characters)
- description: A comprehensive description of what the agent does (100-200 characters)
- expertise: The specific area of expertise of the agent (50-100 characters)
- personality: The personality and communication style of the agent (100-150 characters)
- systemPrompt: A detailed system prompt that the agent will use (200-500 characters)

Respond only with valid JSON in the following format:
{
  \"name\": \"Agent name\",
  \"description\": \"Comprehensive description\",
  \"expertise\": \"Area of expertise\",
  \"personality\": \"Personality and style\",
  \"systemPrompt\": \"Detailed system prompt for the agent\"
}";

/// Wraps a task in an agent's persona, with optional context.
pub fn persona_request(agent: &Agent, context: Option<&str>, task: &str) -> CompletionRequest {
    let mut request = CompletionRequest::new().system(agent.system_prompt.as_str());
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        request = request.system(format!(
            "Context from the current collaboration: {context}"
        ));
    }
    request.user(task)
}

/// Request asking for a structured role/task assignment per agent.
pub fn decomposition_request(agents: &[Agent], user_message: &str) -> CompletionRequest {
    let roster = agents
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "{}. {} (id: {}) - Expertise: {} - {}",
                i + 1,
                a.name,
                a.id,
                a.expertise,
                a.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "You are a collaboration coordinator. Analyze the following task and assign specific roles and tasks to the available agents.

Task: {user_message}

Available agents:
{roster}

Provide a JSON response with the following structure:
{{
  \"strategy\": \"Brief description of the collaboration strategy\",
  \"assignments\": [
    {{
      \"agentId\": \"agent-id\",
      \"role\": \"Specific role (e.g. 'Researcher', 'Writer', 'Reviewer')\",
      \"task\": \"Specific task this agent should perform\"
    }}
  ]
}}

Return exactly one assignment per agent, in the order the agents are listed.

Focus on:
- Complementary roles that together produce a complete result
- Using each agent's expertise
- Avoiding task overlap
- Ensuring clear task distribution"
    );

    CompletionRequest::new()
        .system(DECOMPOSITION_SYSTEM)
        .user(prompt)
}

/// Planning prompt for the coordinator.
pub fn planning_prompt(
    user_message: &str,
    roster: &Roster,
    breakdown: &TaskBreakdown,
    conversation: &str,
) -> String {
    let agents = roster
        .agents()
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let role = breakdown
                .assignment(i)
                .map(|asg| format!(" - Assigned role: {}", asg.role))
                .unwrap_or_default();
            format!("{}. {} - Expertise: {}{}", i + 1, a.name, a.expertise, role)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "As {coordinator}, the collaboration coordinator, create a detailed collaboration plan for the following task:

Task: {user_message}

Collaboration strategy: {strategy}

Available agents:
{agents}

Conversation context:
{conversation}

Create a plan that consists of:
1. An overview of the approach
2. Specific steps and which agent executes each step
3. How the agents should collaborate with each other
4. Expected final result

Present this as a clear plan that the other agents can follow.",
        coordinator = roster.coordinator().name,
        strategy = breakdown.strategy,
    )
}

/// Execution context block for one contributor.
///
/// Lists the contributor's own assignment and the tasks of everyone else so
/// the contribution can be shaped to fit.
pub fn execution_context(
    agent: &Agent,
    assignment: &TaskAssignment,
    roster: &Roster,
    breakdown: &TaskBreakdown,
    plan: &str,
    user_message: &str,
    conversation: &str,
) -> String {
    let others = roster
        .agents()
        .iter()
        .zip(&breakdown.assignments)
        .filter(|(other, _)| other.id != agent.id)
        .map(|(other, asg)| format!("{}: {}", other.name, asg.task))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Collaboration plan from the coordinator:
{plan}

Your role in this collaboration: {role}
Your specific task: {task}
Other agents and their tasks:
{others}

Focus on your expertise ({expertise}).

Task: {user_message}

Conversation context:
{conversation}

Follow the plan and deliver your contribution that matches your expertise. Refer to the plan where relevant, and indicate clearly how other agents can build on your contribution.",
        role = assignment.role,
        task = assignment.task,
        expertise = agent.expertise,
    )
}

/// Integration prompt for the coordinator.
///
/// `contributions` are (agent, execution response) pairs in roster order.
pub fn integration_prompt(
    user_message: &str,
    plan: &str,
    contributions: &[(&Agent, &str)],
) -> String {
    let contributions = if contributions.is_empty() {
        "(no other agents contributed)".to_string()
    } else {
        contributions
            .iter()
            .map(|(agent, response)| format!("{} ({}):\n{}", agent.name, agent.expertise, response))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    };

    format!(
        "As the collaboration coordinator, review all agent contributions and integrate them into a coherent final result.

Original task: {user_message}

Your original plan:
{plan}

Agent contributions:
{contributions}

Integrate these contributions into a cohesive, complete final result that:
1. Combines the best elements from each contribution
2. Has a clear structure
3. Fully answers the original task
4. Shows how the collaboration led to a better result

Also provide a brief evaluation of how the collaboration went."
    )
}

/// Request asking for a new agent persona as JSON.
pub fn agent_factory_request(description: &str) -> CompletionRequest {
    CompletionRequest::new()
        .system(AGENT_FACTORY_SYSTEM)
        .user(description)
}
