//! Configuration for the repair loop

use serde::{Deserialize, Serialize};

/// Hard upper bound for `max_iterations`
pub const MAX_ITERATIONS_LIMIT: usize = 5;

/// Hard upper bound for `top_k`
pub const TOP_K_LIMIT: usize = 10;

/// How the transcript evolves across outer iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptMode {
    /// Start every iteration from the system prompt alone
    #[default]
    Fresh,
    /// Keep appending to one transcript for the whole session
    CarryForward,
}

/// Configuration for the repair loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum draft / self-check / repair cycles per question (1..=5)
    pub max_iterations: usize,

    /// Documents retrieved into the context (1..=10)
    pub top_k: usize,

    /// Transcript handling across iterations
    pub transcript_mode: TranscriptMode,

    /// Extra self-check attempts after an unpaired tool call
    pub pairing_retries: usize,

    /// Run the self-check even when retrieval found nothing
    pub check_ungroundable: bool,
}

impl Default for AgentConfig {
    /// Default configuration matching the classic three-pass loop
    fn default() -> Self {
        Self {
            max_iterations: 3,
            top_k: 3,
            transcript_mode: TranscriptMode::Fresh,
            pairing_retries: 1,
            check_ungroundable: false,
        }
    }
}

impl AgentConfig {
    /// Strict preset: no second chances for protocol violations, every
    /// draft is self-checked
    pub fn strict() -> Self {
        Self {
            max_iterations: 3,
            top_k: 3,
            transcript_mode: TranscriptMode::Fresh,
            pairing_retries: 0,
            check_ungroundable: true,
        }
    }

    /// Lenient preset: more iterations and context, the model keeps its
    /// earlier turns
    pub fn lenient() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS_LIMIT,
            top_k: 5,
            transcript_mode: TranscriptMode::CarryForward,
            pairing_retries: 2,
            check_ungroundable: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_ITERATIONS_LIMIT).contains(&self.max_iterations) {
            return Err(format!(
                "max_iterations must be between 1 and {}, got {}",
                MAX_ITERATIONS_LIMIT, self.max_iterations
            ));
        }
        if !(1..=TOP_K_LIMIT).contains(&self.top_k) {
            return Err(format!(
                "top_k must be between 1 and {}, got {}",
                TOP_K_LIMIT, self.top_k
            ));
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
