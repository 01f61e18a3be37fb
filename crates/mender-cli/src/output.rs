//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use mender_agent::{RepairOutcome, Termination};
use mender_domain::{Document, ToolDefinition};
use colored::*;
use std::path::Path;

/// Output formatter.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the result of an `ask` session.
    pub fn format_outcome(&self, outcome: &RepairOutcome, export: Option<&Path>) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let mut value = serde_json::to_value(outcome)?;
                if let (Some(path), Some(obj)) = (export, value.as_object_mut()) {
                    obj.insert("export".into(), path.display().to_string().into());
                }
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Text => Ok(self.format_outcome_text(outcome, export)),
        }
    }

    fn format_outcome_text(&self, outcome: &RepairOutcome, export: Option<&Path>) -> String {
        let mut lines = vec![format!("{} {}", self.colorize("Answer:", "cyan"), outcome.answer)];

        if !outcome.uncertainties.is_empty() {
            lines.push(String::new());
            lines.push(format!("[Uncertainties detected: {}]", outcome.uncertainties.len()));
            for record in &outcome.uncertainties {
                lines.push(format!("  {}. {}", record.index + 1, record.reason));
            }
        }

        lines.push(String::new());
        let status = format!(
            "Stopped after {} iteration(s): {}",
            outcome.iterations,
            outcome.termination.describe()
        );
        lines.push(match outcome.termination {
            Termination::Accepted => self.success(&status),
            Termination::ProtocolViolation | Termination::NoProgress => self.warning(&status),
            Termination::Exhausted | Termination::Ungroundable => self.info(&status),
        });

        let updates = outcome.updates_applied();
        if updates > 0 {
            lines.push(self.info(&format!("{} knowledge base update(s) applied", updates)));
        }

        if let Some(path) = export {
            lines.push(self.success(&format!("Saved repaired KB to: {}", path.display())));
        }

        lines.join("\n")
    }

    /// Format the inferred annotations of every annotated document.
    pub fn format_inferred(&self, documents: &[Document]) -> Result<String> {
        let annotated: Vec<&Document> = documents.iter().filter(|d| d.is_annotated()).collect();

        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = annotated
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "id": d.id,
                            "title": d.title,
                            "inferred": d.inferred,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&entries)?)
            }
            OutputFormat::Text => {
                if annotated.is_empty() {
                    return Ok(self.colorize("(No changes - KB was not updated)", "yellow"));
                }

                let mut blocks = Vec::with_capacity(annotated.len());
                for doc in annotated {
                    let heading = format!("{} (ID: {}):", doc.title, doc.id);
                    blocks.push(format!(
                        "{}\n{}",
                        self.colorize(&heading, "cyan"),
                        serde_json::to_string_pretty(&doc.inferred)?
                    ));
                }
                Ok(blocks.join("\n\n"))
            }
        }
    }

    /// Format tool definitions. Always JSON; the model sees them that way.
    pub fn format_tools(&self, tools: &[ToolDefinition]) -> Result<String> {
        Ok(serde_json::to_string_pretty(tools)?)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}
