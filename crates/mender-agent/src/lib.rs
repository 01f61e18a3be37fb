//! Mender Agent
//!
//! A bounded self-repair loop for retrieval-augmented question answering.
//!
//! # Overview
//!
//! The agent answers a question from a small document store, asks the model
//! whether its own draft is fully grounded, and if not records the gap and
//! patches the store with a low-confidence inferred annotation before
//! trying again.
//!
//! # Architecture
//!
//! ```text
//! RepairLoop → Retriever (context) → ConversationDriver (draft)
//!            → ConversationDriver (self-check)
//!            → [gap] ToolDispatcher (log_uncertainty + update_kb) → DocumentStore
//!            → next iteration
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use mender_agent::{AgentConfig, RepairLoop};
//! use mender_llm::ScriptedModel;
//! use mender_store::JsonStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonStore::new("knowledge.json");
//! let mut agent = RepairLoop::new(store, ScriptedModel::leave_policies())
//!     .with_config(AgentConfig::default())?;
//!
//! let outcome = agent.answer("What happens to unused vacation days?")?;
//! println!("Answer: {}", outcome.answer);
//! println!("Uncertainties: {}", outcome.uncertainties.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod approval;
mod config;
mod dispatcher;
mod driver;
mod error;
mod prompt;
mod repair;
mod retriever;
mod types;


pub use approval::{AutoApprove, DenyAll, UpdateApproval};
pub use config::{AgentConfig, TranscriptMode, MAX_ITERATIONS_LIMIT, TOP_K_LIMIT};
pub use dispatcher::ToolDispatcher;
pub use driver::{is_paired, ConversationDriver, SelfCheckOutcome};
pub use error::AgentError;
pub use prompt::{draft_prompt, self_check_prompt, SYSTEM_PROMPT};
pub use repair::RepairLoop;
pub use retriever::{render, Retriever, NO_DOCUMENTS};
pub use types::{IterationState, IterationTrace, RepairOutcome, Termination, ToolExchange};
