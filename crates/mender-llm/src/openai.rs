//! OpenAI-compatible chat completions provider
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! with function-style tool calling.

use crate::http::{self, DEFAULT_MAX_RETRIES};
use crate::{interpret_verdict, LlmError};
use mender_domain::traits::ChatModel;
use mender_domain::{Message, ModelReply, Role, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Chat completions provider
///
/// Like [`crate::OllamaProvider`], it blocks on an owned runtime to
/// implement the synchronous [`ChatModel`] trait.
#[derive(Debug)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    max_retries: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

/// Arguments travel as a JSON-encoded string
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}

fn function_kind() -> String {
    "function".to_string()
}

impl OpenAiProvider {
    /// Create a provider for `model` at `base_url`
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::client()?,
            runtime: http::runtime()?,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a provider against the public OpenAI API
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_BASE_URL, api_key, DEFAULT_MODEL)
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

    /// Run one chat completion
    pub async fn chat(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: transcript.iter().map(to_wire).collect(),
            tools: tools
                .iter()
                .map(|function| WireTool { kind: "function", function })
                .collect(),
        };

        debug!("Chat completion: {} messages, {} tools", body.messages.len(), body.tools.len());
        let response: CompletionResponse =
            http::send_with_retry(&self.model, self.max_retries, || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("Response has no choices".to_string()))?;
        Ok(from_wire(choice.message))
    }
}

fn to_wire(message: &Message) -> WireMessage {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                kind: function_kind(),
                function: WireFunction {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect()
    });

    // Assistant turns that only carry tool calls send a null content
    let content = if message.role == Role::Assistant && message.content.is_empty() && tool_calls.is_some() {
        None
    } else {
        Some(message.content.clone())
    };

    WireMessage {
        role: message.role.as_str().to_string(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn from_wire(message: WireMessage) -> ModelReply {
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall::new(call.function.name, call.function.arguments).with_id(call.id))
        .collect();

    let content = message.content.filter(|c| !c.is_empty());
    let verdict = interpret_verdict(content.as_deref(), !tool_calls.is_empty());

    ModelReply {
        content,
        tool_calls,
        verdict,
    }
}

impl ChatModel for OpenAiProvider {
    type Error = LlmError;

    fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error> {
        self.runtime.block_on(self.chat(transcript, tools))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mender_domain::Verdict;

    #[test]
    fn test_provider_defaults() {
        let provider = OpenAiProvider::with_api_key("sk-test").unwrap();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model(), DEFAULT_MODEL);
        assert_eq!(provider.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_tool_turns_keep_call_ids() {
        let call = ToolCall::new("update_kb", r#"{"doc_id":"1","new_content":{}}"#).with_id("call_abc");
        let assistant = to_wire(&Message::assistant_with_tools("", vec![call]));
        let result = to_wire(&Message::tool_result("call_abc", "Updated 1"));

        let assistant = serde_json::to_value(&assistant).unwrap();
        assert!(assistant["content"].is_null());
        assert_eq!(assistant["tool_calls"][0]["id"], "call_abc");
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            r#"{"doc_id":"1","new_content":{}}"#
        );

        let result = serde_json::to_value(&result).unwrap();
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_abc");
        assert_eq!(result["content"], "Updated 1");
    }

    #[test]
    fn test_parse_tool_calls() {
        let raw = r#"{"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "log_uncertainty", "arguments": "{\"reason\": \"Timing not specified\"}"}}
            ]
        }}]}"#;
        let response: CompletionResponse = serde_json::from_str(raw).unwrap();
        let reply = from_wire(response.choices.into_iter().next().unwrap().message);

        assert_eq!(reply.content, None);
        assert_eq!(reply.tool_calls[0].id, "call_1");
        assert_eq!(reply.tool_calls[0].arguments, r#"{"reason": "Timing not specified"}"#);
        assert_eq!(reply.verdict, None);
    }

    #[test]
    fn test_parse_verdicts() {
        let yes = WireMessage {
            role: "assistant".to_string(),
            content: Some("YES".to_string()),
            tool_calls: None,
            tool_call_id: None,
        };
        assert_eq!(from_wire(yes).verdict, Some(Verdict::Accepted));

        let draft = WireMessage {
            role: "assistant".to_string(),
            content: Some("20 days paid vacation per year.".to_string()),
            tool_calls: None,
            tool_call_id: None,
        };
        assert_eq!(from_wire(draft).verdict, None);
    }

    #[test]
    fn test_connection_refused() {
        let provider = OpenAiProvider::new("http://127.0.0.1:9/v1", "sk-test", "gpt-4")
            .unwrap()
            .with_max_retries(1);
        let result = provider.complete(&[Message::user("test")], &[]);
        assert!(matches!(result, Err(LlmError::Communication(_))));
    }

    #[test]
    #[ignore] // Needs OPENAI_API_KEY and network access
    fn test_openai_integration() {
        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let provider = OpenAiProvider::with_api_key(key).unwrap();
        let reply = provider
            .complete(&[Message::user("Respond with YES and nothing else")], &[])
            .unwrap();
        assert_eq!(reply.verdict, Some(Verdict::Accepted));
    }
}
