//! Runtime configuration: `.colloquy/config.toml` plus environment overrides.
//!
//! Every field is optional in the file. Environment variables win over the
//! file, and the result is validated once at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use llm::LlmConfig;
use nodes::RunSettings;
use pipeline::CollaborationError;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = ".colloquy/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub llm: LlmSection,
    pub pipeline: PipelineSection,
    pub storage: StorageSection,
    pub telemetry: TelemetrySection,
}

/// `[llm]`
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub decomposition_temperature: f32,
    pub max_attempts: u32,
    pub request_timeout_secs: u64,
    /// Never read from the file; only from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        let llm = LlmConfig::default();
        Self {
            base_url: llm.base_url,
            model: llm.model,
            temperature: llm.temperature,
            decomposition_temperature: RunSettings::default().decomposition_temperature,
            max_attempts: llm.max_attempts,
            request_timeout_secs: llm.request_timeout.as_secs(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for LlmSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSection")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("decomposition_temperature", &self.decomposition_temperature)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// `[pipeline]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub max_concurrency: usize,
    pub context_window: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let run = RunSettings::default();
        Self {
            max_concurrency: run.max_concurrency,
            context_window: run.context_window,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// `[telemetry]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads the file (if any), applies process environment overrides and
    /// validates the result.
    ///
    /// A missing file is only an error when `path` was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, CollaborationError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, CollaborationError> {
        let text = std::fs::read_to_string(path).map_err(|e| configuration_error(path, e))?;
        Self::from_toml(&text).map_err(|e| configuration_error(path, e))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("COLLOQUY_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("COLLOQUY_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(dir) = lookup("COLLOQUY_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = Some(endpoint);
        }
    }

    pub fn validate(&self) -> Result<(), CollaborationError> {
        let invalid = |message: String| Err(CollaborationError::ConfigurationError { message });

        if self.pipeline.max_concurrency == 0 {
            return invalid("pipeline.max_concurrency must be at least 1".into());
        }
        if self.pipeline.context_window == 0 {
            return invalid("pipeline.context_window must be at least 1".into());
        }
        if self.llm.max_attempts == 0 {
            return invalid("llm.max_attempts must be at least 1".into());
        }
        for (name, value) in [
            ("llm.temperature", self.llm.temperature),
            ("llm.decomposition_temperature", self.llm.decomposition_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return invalid(format!("{name} must be between 0.0 and 2.0, got {value}"));
            }
        }
        if self.llm.base_url.trim().is_empty() || self.llm.model.trim().is_empty() {
            return invalid("llm.base_url and llm.model must not be empty".into());
        }
        Ok(())
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            api_key: self.llm.api_key.clone(),
            temperature: self.llm.temperature,
            max_attempts: self.llm.max_attempts,
            request_timeout: Duration::from_secs(self.llm.request_timeout_secs),
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            max_concurrency: self.pipeline.max_concurrency,
            context_window: self.pipeline.context_window,
            decomposition_temperature: self.llm.decomposition_temperature,
        }
    }
}

fn configuration_error(path: &Path, error: impl std::fmt::Display) -> CollaborationError {
    CollaborationError::ConfigurationError {
        message: format!("{}: {error}", path.display()),
    }
}
