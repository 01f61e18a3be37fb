//! Mender Chat Model Layer
//!
//! Pluggable implementations of the `ChatModel` trait from `mender-domain`.
//!
//! # Providers
//!
//! - `MockModel`: queued replies, records every transcript it sees
//! - `ScriptedModel`: deterministic topic rules that behave like a model
//!   answering leave-policy questions
//! - `OllamaProvider`: local Ollama `/api/chat` with tool calling
//! - `OpenAiProvider`: OpenAI-compatible chat completions with tool calling
//!
//! HTTP providers interpret a leading `YES` / `NO` in a tool-free reply and
//! set [`ModelReply::verdict`] so the repair loop never inspects reply text.
//!
//! # Examples
//!
//! ```
//! use mender_domain::traits::ChatModel;
//! use mender_domain::{Message, ModelReply};
//! use mender_llm::MockModel;
//!
//! let model = MockModel::new([ModelReply::text("draft"), ModelReply::accept()]);
//! let transcript = [Message::user("hello")];
//!
//! assert_eq!(model.complete(&transcript, &[]).unwrap().content.as_deref(), Some("draft"));
//! assert!(model.complete(&transcript, &[]).unwrap().is_accepted());
//! assert_eq!(model.call_count(), 2);
//! ```

#![warn(missing_docs)]

mod http;
pub mod ollama;
pub mod openai;
pub mod scripted;

use mender_domain::traits::ChatModel;
use mender_domain::{Message, ModelReply, ToolDefinition, Verdict};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use scripted::{DraftRule, RepairRule, ScriptedModel};

/// Errors that can occur during model calls
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the model
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Read the self-check verdict out of reply text.
///
/// Only a reply without tool calls carries a verdict. The text must start
/// with the word `YES` or `NO` (case-insensitive) after trimming, so
/// "Nothing..." or "Yesterday..." carry none.
pub fn interpret_verdict(content: Option<&str>, has_tool_calls: bool) -> Option<Verdict> {
    if has_tool_calls {
        return None;
    }
    let text = content?.trim_start();
    if starts_with_word(text, "yes") {
        Some(Verdict::Accepted)
    } else if starts_with_word(text, "no") {
        Some(Verdict::Rejected)
    } else {
        None
    }
}

fn starts_with_word(text: &str, word: &str) -> bool {
    match text.get(..word.len()) {
        Some(head) if head.eq_ignore_ascii_case(word) => !text[word.len()..]
            .chars()
            .next()
            .is_some_and(char::is_alphanumeric),
        _ => false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One queued mock outcome
#[derive(Debug, Clone)]
enum Scripted {
    Reply(ModelReply),
    Error(String),
}

/// Mock chat model for deterministic testing
///
/// Replies are served in the order they were queued. Once the queue is
/// drained the last reply is repeated, so a model that "always finds a gap"
/// is a single queued reply. Clones share the queue, the call count and the
/// recorded transcripts.
///
/// # Examples
///
/// ```
/// use mender_domain::traits::ChatModel;
/// use mender_domain::ModelReply;
/// use mender_llm::MockModel;
///
/// let mut model = MockModel::default();
/// model.push_reply(ModelReply::text("only reply"));
/// model.complete(&[], &[]).unwrap();
/// assert_eq!(model.complete(&[], &[]).unwrap().content.as_deref(), Some("only reply"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockModel {
    queue: Arc<Mutex<VecDeque<Scripted>>>,
    last: Arc<Mutex<Option<Scripted>>>,
    transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockModel {
    /// Create a mock that serves `replies` in order
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        let model = Self::default();
        lock(&model.queue).extend(replies.into_iter().map(Scripted::Reply));
        model
    }

    /// Queue another reply
    pub fn push_reply(&mut self, reply: ModelReply) {
        lock(&self.queue).push_back(Scripted::Reply(reply));
    }

    /// Queue a failing call
    pub fn push_error(&mut self, message: impl Into<String>) {
        lock(&self.queue).push_back(Scripted::Error(message.into()));
    }

    /// Get the number of times `complete` was called
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *lock(&self.call_count) = 0;
    }

    /// Every transcript passed to `complete`, oldest first
    pub fn transcripts(&self) -> Vec<Vec<Message>> {
        lock(&self.transcripts).clone()
    }
}

impl ChatModel for MockModel {
    type Error = LlmError;

    fn complete(
        &self,
        transcript: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error> {
        *lock(&self.call_count) += 1;
        lock(&self.transcripts).push(transcript.to_vec());

        let next = lock(&self.queue).pop_front();
        let scripted = match next {
            Some(s) => {
                *lock(&self.last) = Some(s.clone());
                s
            }
            None => lock(&self.last).clone().unwrap_or(Scripted::Reply(ModelReply::empty())),
        };

        match scripted {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Error(message) => Err(LlmError::Other(message)),
        }
    }
}
