//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the repair loop and
//! infrastructure. Implementations live in other crates.

use crate::{Document, Message, ModelReply, ToolDefinition};
use serde_json::{Map, Value};

/// Trait for the document store
///
/// Implemented by the infrastructure layer (mender-store)
pub trait DocumentStore {
    /// Error type for store operations
    type Error;

    /// Replace the in-memory collection with the persisted one
    fn load(&mut self) -> Result<(), Self::Error>;

    /// Persist the in-memory collection
    fn save(&self) -> Result<(), Self::Error>;

    /// Get a document by id
    fn get(&self, id: &str) -> Option<&Document>;

    /// All documents, in store order
    fn documents(&self) -> &[Document];

    /// Validate and merge an annotation patch, then persist.
    ///
    /// All-or-nothing: a rejected patch writes no key.
    fn update(&mut self, id: &str, patch: &Map<String, Value>) -> Result<(), Self::Error>;
}

/// Trait for chat model operations
///
/// Implemented by the infrastructure layer (mender-llm)
pub trait ChatModel {
    /// Error type for model calls
    type Error;

    /// Produce the next reply for a transcript, optionally offering tools
    fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error>;
}

impl<M: ChatModel + ?Sized> ChatModel for Box<M> {
    type Error = M::Error;

    fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error> {
        (**self).complete(transcript, tools)
    }
}

impl<M: ChatModel + ?Sized> ChatModel for &M {
    type Error = M::Error;

    fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error> {
        (**self).complete(transcript, tools)
    }
}
