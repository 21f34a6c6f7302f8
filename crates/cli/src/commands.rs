//! Sub-command handlers.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::AsyncWriteExt;

use llm::OpenAiCompletionService;
use nodes::emitter::DEFAULT_CAPACITY;
use nodes::{AgentFactory, CollaborationService, EventEmitter, RunOutcome};
use pipeline::{
    Agent, AgentDirectory, AgentId, AgentRole, CollaborationId, CompletionService, SSE_DONE,
};
use store::JsonFileStore;

use crate::config::Config;
use crate::{AddAgent, AgentCommand, CollabCommand, Command};

pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(JsonFileStore::new(&config.storage.data_dir));
    match command {
        Command::Agent(command) => agent(command, config, store).await,
        Command::Collab(command) => collab(command, config, store).await,
    }
}

fn completion(config: &Config) -> anyhow::Result<Arc<dyn CompletionService>> {
    let service = OpenAiCompletionService::new(config.llm_config())
        .context("cannot construct the completion service")?;
    Ok(Arc::new(service))
}

fn collaboration_service(
    config: &Config,
    store: Arc<JsonFileStore>,
    completion: Arc<dyn CompletionService>,
) -> CollaborationService {
    CollaborationService::new(completion, store.clone(), store, config.run_settings())
}

// ---------------------------------------------------------------------------
// agent
// ---------------------------------------------------------------------------

async fn agent(
    command: AgentCommand,
    config: &Config,
    store: Arc<JsonFileStore>,
) -> anyhow::Result<()> {
    match command {
        AgentCommand::Create { prompt } => {
            let factory = AgentFactory::new(completion(config)?, store);
            let agent = factory.create_from_prompt(&prompt).await?;
            print_agent(&agent);
        }
        AgentCommand::Add(add) => {
            let agent = manual_agent(add)?;
            store.save_agent(&agent).await?;
            print_agent(&agent);
        }
        AgentCommand::List => {
            for agent in store.list_agents().await? {
                print_agent(&agent);
            }
        }
        AgentCommand::Remove { id } => {
            let id = AgentId::new(id).context("agent id must not be empty")?;
            store.delete_agent(&id).await?;
            tracing::info!(agent_id = %id, "Agent removed");
        }
    }
    Ok(())
}

fn manual_agent(add: AddAgent) -> anyhow::Result<Agent> {
    for (flag, value) in [
        ("--name", &add.name),
        ("--expertise", &add.expertise),
        ("--system-prompt", &add.system_prompt),
    ] {
        if value.trim().is_empty() {
            bail!("{flag} must not be empty");
        }
    }
    let role = if add.coordinator {
        AgentRole::Coordinator
    } else {
        AgentRole::Contributor
    };
    Ok(
        Agent::new(add.name.trim(), add.expertise.trim(), add.system_prompt.trim())
            .with_description(add.description.trim())
            .with_personality(add.personality.trim())
            .with_role(role),
    )
}

fn print_agent(agent: &Agent) {
    let marker = if agent.role == AgentRole::Coordinator {
        " [coordinator]"
    } else {
        ""
    };
    println!("{}\t{}\t{}{}", agent.id, agent.name, agent.expertise, marker);
}

// ---------------------------------------------------------------------------
// collab
// ---------------------------------------------------------------------------

async fn collab(
    command: CollabCommand,
    config: &Config,
    store: Arc<JsonFileStore>,
) -> anyhow::Result<()> {
    match command {
        CollabCommand::Create {
            name,
            description,
            agents,
        } => {
            let ids = agents
                .into_iter()
                .map(|id| AgentId::new(id).context("agent ids must not be empty"))
                .collect::<anyhow::Result<Vec<_>>>()?;
            for id in &ids {
                if store.get_agent(id).await?.is_none() {
                    tracing::warn!(agent_id = %id, "Selected agent does not exist yet");
                }
            }
            // Creating and listing never call the model.
            let service = collaboration_service(config, store, Arc::new(Offline));
            let collaboration = service.create_collaboration(&name, &description, ids).await?;
            println!("{}", collaboration.id);
        }
        CollabCommand::List => {
            let service = collaboration_service(config, store, Arc::new(Offline));
            for c in service.list_collaborations().await? {
                println!(
                    "{}\t{}\t{}\t{} messages",
                    c.id,
                    c.status(),
                    c.name,
                    c.messages().len()
                );
            }
        }
        CollabCommand::Show { id } => {
            let service = collaboration_service(config, store, Arc::new(Offline));
            let collaboration = service.get_collaboration(id).await?;
            println!("{}", serde_json::to_string_pretty(&collaboration)?);
        }
        CollabCommand::Send { id, message } => {
            let service = collaboration_service(config, store, completion(config)?);
            stream_run(&service, id, &message).await?;
        }
    }
    Ok(())
}

/// Runs the pipeline and writes every event to stdout as an SSE frame.
async fn stream_run(
    service: &CollaborationService,
    id: CollaborationId,
    message: &str,
) -> anyhow::Result<()> {
    let (emitter, mut rx) = EventEmitter::channel(DEFAULT_CAPACITY);
    let forward = async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = rx.recv().await {
            stdout.write_all(event.to_sse_frame()?.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<_, anyhow::Error>(stdout)
    };

    let (outcome, stdout) = tokio::join!(service.send_message(id, message, emitter), forward);
    let outcome = outcome?;
    let mut stdout = stdout.context("failed to write the event stream")?;
    match outcome {
        RunOutcome::Completed => {
            stdout.write_all(SSE_DONE.as_bytes()).await?;
            stdout.flush().await?;
            Ok(())
        }
        RunOutcome::Cancelled { stage } => bail!("event stream closed during {stage}"),
    }
}

/// Stand-in for commands that never reach the model.
struct Offline;

#[async_trait::async_trait]
impl CompletionService for Offline {
    async fn complete(
        &self,
        _request: &pipeline::CompletionRequest,
    ) -> Result<String, pipeline::CompletionError> {
        Err(pipeline::CompletionError::NotConfigured {
            message: "this command does not call the completion service".into(),
        })
    }
}
