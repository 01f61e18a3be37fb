//! CLI command definitions and argument parsing.

use crate::config::{ApprovalPolicy, ModelKind, OutputFormat};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Mender - answer questions from a knowledge base and repair its gaps.
#[derive(Debug, Parser)]
#[command(name = "mender")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path (defaults to ~/.mender/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer a question, repairing the knowledge base when the draft has gaps
    Ask(AskArgs),

    /// List the inferred annotations in a knowledge base
    Inspect(InspectArgs),

    /// Print the tool definitions offered to the model
    Tools,
}

/// Arguments for the ask command.
#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question to answer
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,

    /// Knowledge base file
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Write the repaired knowledge base to this file afterwards
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Chat model backend
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    /// Approval policy for knowledge base updates
    #[arg(short, long, value_enum)]
    pub approve: Option<ApprovalPolicy>,

    /// Maximum draft / self-check cycles (1-5)
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// API key for the OpenAI-compatible backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}

impl AskArgs {
    /// The question words joined back into one string.
    pub fn question_text(&self) -> String {
        self.question.join(" ")
    }
}

/// Arguments for the inspect command.
#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Knowledge base file
    #[arg(short, long)]
    pub store: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "mender",
            "ask",
            "What",
            "happens",
            "to",
            "unused",
            "vacation",
            "days?",
            "--model",
            "ollama",
            "--approve",
            "deny",
            "--max-iterations",
            "5",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question_text(), "What happens to unused vacation days?");
        assert_eq!(args.model, Some(ModelKind::Ollama));
        assert_eq!(args.approve, Some(ApprovalPolicy::Deny));
        assert_eq!(args.max_iterations, Some(5));
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["mender", "ask"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mender", "inspect", "--store", "kb.json", "--format", "json", "--no-color",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.no_color);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.store, Some(PathBuf::from("kb.json")));
    }
}
