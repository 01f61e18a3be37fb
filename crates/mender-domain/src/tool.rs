//! The tool contract exposed to the model

use crate::document::AGENT_INFERRED_SOURCE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The tools the agent understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Query the knowledge base
    SearchKb,
    /// Record a detected gap
    LogUncertainty,
    /// Patch a document with inferred annotations
    UpdateKb,
}

impl ToolKind {
    /// Every tool, in the order they are advertised
    pub const ALL: [ToolKind; 3] = [ToolKind::SearchKb, ToolKind::LogUncertainty, ToolKind::UpdateKb];

    /// Tool name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::SearchKb => "search_kb",
            ToolKind::LogUncertainty => "log_uncertainty",
            ToolKind::UpdateKb => "update_kb",
        }
    }

    /// Parse a tool name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "search_kb" => Some(ToolKind::SearchKb),
            "log_uncertainty" => Some(ToolKind::LogUncertainty),
            "update_kb" => Some(ToolKind::UpdateKb),
            _ => None,
        }
    }

    /// Declared definition passed to the model integration unchanged
    pub fn definition(&self) -> ToolDefinition {
        match self {
            ToolKind::SearchKb => ToolDefinition {
                name: self.as_str().to_string(),
                description: "Search the knowledge base for documents relevant to a query".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search query"}
                    },
                    "required": ["query"]
                }),
            },
            ToolKind::LogUncertainty => ToolDefinition {
                name: self.as_str().to_string(),
                description: "Log a fact the knowledge base does not establish. \
                              Must be called together with update_kb."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "reason": {"type": "string", "description": "What is missing or unclear"}
                    },
                    "required": ["reason"]
                }),
            },
            ToolKind::UpdateKb => ToolDefinition {
                name: self.as_str().to_string(),
                description: "Add low-confidence inferred facts to a document. \
                              Must be called together with log_uncertainty."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "doc_id": {"type": "string", "description": "Document identifier"},
                        "new_content": {
                            "type": "object",
                            "description": "Fact key to annotation",
                            "additionalProperties": {
                                "type": "object",
                                "properties": {
                                    "assumption": {"type": "string"},
                                    "confidence": {
                                        "type": "number",
                                        "exclusiveMinimum": 0,
                                        "maximum": 1
                                    },
                                    "source": {"type": "string", "enum": [AGENT_INFERRED_SOURCE]}
                                },
                                "required": ["assumption", "confidence", "source"]
                            }
                        }
                    },
                    "required": ["doc_id", "new_content"]
                }),
            },
        }
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown tool: {}", s))
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, description and JSON-Schema parameters of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Parameter schema (JSON Schema)
    pub parameters: Value,
}

/// Definitions of all tools
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.iter().map(ToolKind::definition).collect()
}
