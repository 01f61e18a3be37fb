//! Ask command implementation.

use crate::cli::AskArgs;
use crate::config::{ApprovalPolicy, Config, ModelKind};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use mender_agent::{DenyAll, RepairLoop, Termination};
use mender_domain::traits::ChatModel;
use mender_llm::{LlmError, OllamaProvider, OpenAiProvider, ScriptedModel};
use mender_store::JsonStore;
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Execute the ask command.
pub fn execute_ask(args: AskArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let question = args.question_text();
    if question.trim().is_empty() {
        return Err(CliError::InvalidInput("Question must not be empty".to_string()));
    }

    let mut agent_config = config.agent.clone();
    if let Some(max_iterations) = args.max_iterations {
        agent_config.max_iterations = max_iterations;
    }

    let store_path = args.store.clone().unwrap_or_else(|| config.store.clone());
    let store = JsonStore::new(&store_path).with_gatekeeper(config.gatekeeper()?);

    let model = build_model(args.model.unwrap_or(config.model), &args, config)?;
    let agent = RepairLoop::new(store, model).with_config(agent_config)?;

    let mut agent = match args.approve.unwrap_or(config.approve) {
        ApprovalPolicy::Auto => agent,
        ApprovalPolicy::Deny => agent.with_approval(DenyAll),
        ApprovalPolicy::Prompt => {
            let prompt_formatter = formatter.clone();
            agent.with_approval(move |doc_id: &str, patch: &Map<String, Value>| {
                confirm_update(&prompt_formatter, doc_id, patch)
            })
        }
    };

    let outcome = agent.answer(&question)?;
    if outcome.termination == Termination::ProtocolViolation {
        warn!("Session {} ended without a paired repair", outcome.session_id);
    }

    if let Some(path) = &args.export {
        agent.store().export(path)?;
    }

    println!("{}", formatter.format_outcome(&outcome, args.export.as_deref())?);
    Ok(())
}

fn build_model(
    kind: ModelKind,
    args: &AskArgs,
    config: &Config,
) -> Result<Box<dyn ChatModel<Error = LlmError>>> {
    Ok(match kind {
        ModelKind::Mock => Box::new(ScriptedModel::leave_policies()),
        ModelKind::Ollama => Box::new(OllamaProvider::new(
            &config.ollama.endpoint,
            &config.ollama.model,
        )?),
        ModelKind::Openai => {
            let api_key = args.openai_api_key.clone().ok_or_else(|| {
                CliError::Config("OPENAI_API_KEY must be set for the openai model".to_string())
            })?;
            Box::new(OpenAiProvider::new(
                &config.openai.base_url,
                api_key,
                &config.openai.model,
            )?)
        }
    })
}

/// Show a pending update on stderr and read a y/n answer from stdin.
/// Anything but an explicit yes, including a read error, denies.
fn confirm_update(formatter: &Formatter, doc_id: &str, patch: &Map<String, Value>) -> bool {
    let rendered = serde_json::to_string_pretty(patch).unwrap_or_default();
    eprintln!();
    eprintln!("{}", formatter.info("Model wants to update the knowledge base"));
    eprintln!("Doc ID: {}", doc_id);
    eprintln!("New content: {}", rendered);
    eprint!("\nApprove this KB update? (y/n): ");
    let _ = io::stderr().flush();

    let mut line = String::new();
    let approved = match io::stdin().lock().read_line(&mut line) {
        Ok(_) => is_confirmation(&line),
        Err(_) => false,
    };

    if approved {
        eprintln!("{}", formatter.success("Approved"));
    } else {
        eprintln!("{}", formatter.error("Update rejected"));
    }
    approved
}

fn is_confirmation(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
