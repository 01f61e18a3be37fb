//! Mender Domain Layer
//!
//! Core types shared by every other crate of the self-repair agent.
//!
//! ## Key Concepts
//!
//! - **Document**: a unit of the knowledge base (id, title, content)
//! - **Annotation**: an agent-inferred, confidence-scored fact patched onto a document
//! - **Uncertainty Log**: the gaps detected during one `answer` session
//! - **Transcript**: role-tagged messages exchanged with the chat model
//! - **Tools**: the three tools the model may call during self-check
//!
//! ## Architecture
//!
//! Infrastructure (file store, model providers) lives in other crates and is
//! reached only through the traits in [`traits`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversation;
pub mod document;
pub mod tool;
pub mod traits;
pub mod uncertainty;

// Re-exports for convenience
pub use conversation::{Message, ModelReply, Role, ToolCall, Verdict};
pub use document::{Annotation, Document, InferredMap, AGENT_INFERRED_SOURCE};
pub use tool::{tool_definitions, ToolDefinition, ToolKind};
pub use uncertainty::{UncertaintyLog, UncertaintyRecord};
