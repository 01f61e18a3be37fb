//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use mender_agent::AgentConfig;
use mender_gatekeeper::{Gatekeeper, ValidationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Knowledge base file used when `--store` is not given
    #[serde(default = "default_store")]
    pub store: PathBuf,

    /// Chat model backend
    #[serde(default)]
    pub model: ModelKind,

    /// Approval policy for knowledge base updates
    #[serde(default)]
    pub approve: ApprovalPolicy,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaSettings,

    /// OpenAI-compatible provider settings (the key comes from the environment)
    #[serde(default)]
    pub openai: OpenAiSettings,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Repair loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Annotation patch validation
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Chat model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Offline scripted model for the bundled leave-policy knowledge base
    #[default]
    Mock,
    /// Local Ollama server
    Ollama,
    /// OpenAI-compatible chat completions API
    Openai,
}

/// Who decides whether `update_kb` may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Apply every update
    #[default]
    Auto,
    /// Ask on the terminal before each update
    Prompt,
    /// Reject every update
    Deny,
}

/// Ollama provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaSettings {
    /// Server endpoint
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI-compatible provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API base URL
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Config {
    /// Get the configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".mender").join("config.toml"))
    }

    /// Load configuration from the default path, creating it with the
    /// defaults on first use.
    pub fn load() -> Result<Self> {
        Self::load_or_init(&Self::path()?)
    }

    /// Load configuration from `path`, writing the defaults there first if
    /// the file does not exist. A failed write only costs the file.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Self::default();
        if let Err(e) = config.save_to(path) {
            warn!("Could not write default config to {}: {}", path.display(), e);
        }
        Ok(config)
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Gatekeeper built from the `[validation]` table.
    pub fn gatekeeper(&self) -> Result<Gatekeeper> {
        Gatekeeper::try_new(self.validation.clone()).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Check the embedded agent and validation tables.
    pub fn validate(&self) -> Result<()> {
        self.agent.validate().map_err(CliError::Config)?;
        self.validation.validate().map_err(CliError::Config)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: default_store(),
            model: ModelKind::default(),
            approve: ApprovalPolicy::default(),
            ollama: OllamaSettings::default(),
            openai: OpenAiSettings::default(),
            settings: Settings::default(),
            agent: AgentConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Text,
        }
    }
}

fn default_store() -> PathBuf {
    PathBuf::from("knowledge.json")
}

fn default_ollama_endpoint() -> String {
    mender_llm::ollama::DEFAULT_ENDPOINT.to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_openai_base_url() -> String {
    mender_llm::openai::DEFAULT_BASE_URL.to_string()
}

fn default_openai_model() -> String {
    mender_llm::openai::DEFAULT_MODEL.to_string()
}

fn default_true() -> bool {
    true
}
