//! One-JSON-file-per-aggregate store.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/collaborations/<collaboration-id>.json
//! <data_dir>/agents/<agent-id>.json
//! ```
//!
//! Records are pretty-printed camelCase JSON. Writes go to a temporary sibling
//! file that is then renamed over the target, so readers never observe a
//! half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::instrument;

use pipeline::{
    Agent, AgentDirectory, AgentId, Collaboration, CollaborationId, CollaborationStore,
    StoreError,
};

const COLLABORATIONS_DIR: &str = "collaborations";
const AGENTS_DIR: &str = "agents";

/// File-backed implementation of both store ports.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collaboration_path(&self, id: CollaborationId) -> PathBuf {
        self.root.join(COLLABORATIONS_DIR).join(format!("{id}.json"))
    }

    fn agent_path(&self, id: &AgentId) -> PathBuf {
        self.root.join(AGENTS_DIR).join(format!("{}.json", file_stem(id.as_str())))
    }
}

/// Encodes an externally supplied id as a file stem that stays inside the
/// data directory. ASCII letters, digits and `-` pass through; every other
/// byte (`_` included) becomes `_XX`, so distinct ids never share a file.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => stem.push(char::from(byte)),
            _ => stem.push_str(&format!("_{byte:02X}")),
        }
    }
    stem
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        key: path.display().to_string(),
        source,
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let data = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialization {
        key: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).await.map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| io_error(path, e))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let data = match fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| StoreError::Serialization {
            key: path.display().to_string(),
            source,
        })
}

async fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, e)),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(record) = read_json(&path).await? {
            records.push(record);
        }
    }
    Ok(records)
}

#[async_trait]
impl CollaborationStore for JsonFileStore {
    #[instrument(skip_all, fields(collaboration_id = %collaboration.id))]
    async fn save(&self, collaboration: &Collaboration) -> Result<(), StoreError> {
        write_json(&self.collaboration_path(collaboration.id), collaboration).await
    }

    #[instrument(skip(self))]
    async fn load(&self, id: CollaborationId) -> Result<Option<Collaboration>, StoreError> {
        read_json(&self.collaboration_path(id)).await
    }

    async fn list(&self) -> Result<Vec<Collaboration>, StoreError> {
        let mut all: Vec<Collaboration> = read_all(&self.root.join(COLLABORATIONS_DIR)).await?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[async_trait]
impl AgentDirectory for JsonFileStore {
    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        read_json(&self.agent_path(id)).await
    }

    #[instrument(skip_all, fields(agent_id = %agent.id))]
    async fn save_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        write_json(&self.agent_path(&agent.id), agent).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let mut all: Vec<Agent> = read_all(&self.root.join(AGENTS_DIR)).await?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_agent(&self, id: &AgentId) -> Result<(), StoreError> {
        let path = self.agent_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                key: id.to_string(),
            }),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
