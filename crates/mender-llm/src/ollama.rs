//! Ollama Provider Implementation
//!
//! Talks to a local Ollama instance through its `/api/chat` endpoint,
//! passing the tool definitions through so the model can request
//! `search_kb`, `log_uncertainty` and `update_kb` calls.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama API
//! - Configurable endpoint and model
//! - Retry logic with exponential backoff
//! - Timeout handling
//!
//! # Examples
//!
//! ```no_run
//! use mender_domain::traits::ChatModel;
//! use mender_domain::{tool_definitions, Message};
//! use mender_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3.1").unwrap();
//! let reply = provider
//!     .complete(&[Message::user("Say hello")], &tool_definitions())
//!     .unwrap();
//! println!("{:?}", reply.content);
//! ```

use crate::http::{self, DEFAULT_MAX_RETRIES};
use crate::{interpret_verdict, LlmError};
use mender_domain::traits::ChatModel;
use mender_domain::{Message, ModelReply, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama chat provider for local inference
///
/// The provider owns a single-threaded tokio runtime and blocks on it in
/// [`ChatModel::complete`], so it must not be called from inside another
/// async runtime. Use [`OllamaProvider::chat`] there instead.
#[derive(Debug)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    max_retries: u32,
}

/// Request body for the Ollama chat API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

/// Ollama sends and expects arguments as a JSON object, not a string
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

/// Response from the Ollama chat API
#[derive(Deserialize)]
struct ChatResponse {
    message: WireMessage,
    #[allow(dead_code)]
    #[serde(default)]
    done: bool,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use; it must support tool calling (e.g., "llama3.1")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: http::client()?,
            runtime: http::runtime()?,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a new Ollama provider on `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the maximum number of attempts per call
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one chat turn
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running
    /// - Model is not available
    /// - Network communication fails
    /// - Response format is invalid
    pub async fn chat(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = ChatRequest {
            model: &self.model,
            messages: transcript.iter().map(to_wire).collect(),
            tools: tools
                .iter()
                .map(|function| WireTool { kind: "function", function })
                .collect(),
            stream: false,
        };

        debug!("Ollama chat: {} messages, {} tools", body.messages.len(), body.tools.len());
        let response: ChatResponse =
            http::send_with_retry(&self.model, self.max_retries, || {
                self.client.post(&url).json(&body)
            })
            .await?;

        Ok(from_wire(response.message))
    }
}

fn to_wire(message: &Message) -> WireMessage {
    WireMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                function: WireFunction {
                    name: call.name.clone(),
                    arguments: serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| Value::String(call.arguments.clone())),
                },
            })
            .collect(),
    }
}

fn from_wire(message: WireMessage) -> ModelReply {
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = match call.function.arguments {
                Value::String(raw) => raw,
                other => other.to_string(),
            };
            ToolCall::new(call.function.name, arguments)
        })
        .collect();

    let content = Some(message.content).filter(|c| !c.is_empty());
    let verdict = interpret_verdict(content.as_deref(), !tool_calls.is_empty());

    ModelReply {
        content,
        tool_calls,
        verdict,
    }
}

impl ChatModel for OllamaProvider {
    type Error = LlmError;

    fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error> {
        self.runtime.block_on(self.chat(transcript, tools))
    }
}
