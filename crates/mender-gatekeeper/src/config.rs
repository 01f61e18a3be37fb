//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Highest confidence an inferred annotation may claim (0.0-1.0]
    pub max_confidence: f64,

    /// Reject annotations whose assumption is blank
    pub require_nonempty_assumption: bool,

    /// Enable fact key format checking (ASCII letters, digits, `_`, `-`)
    pub validate_fact_keys: bool,

    /// Maximum number of fact keys in a single patch
    pub max_patch_keys: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_confidence: 1.0,
            require_nonempty_assumption: true,
            validate_fact_keys: true,
            max_patch_keys: 16,
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (structural checks only)
    pub fn permissive() -> Self {
        Self {
            max_confidence: 1.0,
            require_nonempty_assumption: false,
            validate_fact_keys: false,
            max_patch_keys: usize::MAX,
        }
    }

    /// Create a strict configuration: inferred facts must stay low-confidence
    pub fn strict() -> Self {
        Self {
            max_confidence: 0.5,
            require_nonempty_assumption: true,
            validate_fact_keys: true,
            max_patch_keys: 4,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_confidence > 0.0 && self.max_confidence <= 1.0) {
            return Err(format!(
                "max_confidence must be in (0.0, 1.0], got {}",
                self.max_confidence
            ));
        }
        if self.max_patch_keys == 0 {
            return Err("max_patch_keys must be greater than 0".to_string());
        }
        Ok(())
    }
}
