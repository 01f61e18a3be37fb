//! Draft and self-check exchanges with the chat model

use crate::error::AgentError;
use crate::prompt::{draft_prompt, pairing_correction, self_check_prompt, UNPAIRED_RESULT};
use mender_domain::traits::ChatModel;
use mender_domain::{tool_definitions, Message, ModelReply, ToolCall, ToolDefinition, ToolKind};
use std::fmt::Display;
use tracing::{debug, warn};

/// Result of the self-check state
#[derive(Debug, Clone, PartialEq)]
pub enum SelfCheckOutcome {
    /// The model affirmed the draft
    Accepted,
    /// Paired repair calls to dispatch, in the order given
    Repair(Vec<ToolCall>),
    /// The model asked for a repair without pairing the tools, even after
    /// the corrective retries. None of these calls may be dispatched.
    Unpaired(Vec<ToolCall>),
    /// Empty reply
    NoProgress,
}

/// Whether `calls` contain at least one `log_uncertainty` and at least
/// one `update_kb`
pub fn is_paired(calls: &[ToolCall]) -> bool {
    let has = |kind: ToolKind| calls.iter().any(|c| c.name == kind.as_str());
    has(ToolKind::LogUncertainty) && has(ToolKind::UpdateKb)
}

/// Wraps the chat model for the two exchange shapes of an iteration
pub struct ConversationDriver<'m, M> {
    model: &'m M,
    tools: Vec<ToolDefinition>,
    pairing_retries: usize,
}

impl<'m, M> ConversationDriver<'m, M>
where
    M: ChatModel,
    M::Error: Display,
{
    /// Create a driver offering every tool during self-check
    pub fn new(model: &'m M, pairing_retries: usize) -> Self {
        Self {
            model,
            tools: tool_definitions(),
            pairing_retries,
        }
    }

    fn call(&self, transcript: &[Message], tools: &[ToolDefinition]) -> Result<ModelReply, AgentError> {
        self.model
            .complete(transcript, tools)
            .map_err(|e| AgentError::Model(e.to_string()))
    }

    /// Draft state: ask for an answer to `question` given `context`.
    ///
    /// Returns `None` when the reply has no text, which the loop treats
    /// as no progress. Tools are not offered here.
    pub fn draft(
        &self,
        transcript: &mut Vec<Message>,
        context: &str,
        question: &str,
    ) -> Result<Option<String>, AgentError> {
        transcript.push(Message::user(draft_prompt(context, question)));
        let reply = self.call(transcript, &[])?;

        let draft = reply.text_content().map(str::to_string);
        match &draft {
            Some(text) => {
                debug!("Draft: {}", text);
                transcript.push(Message::assistant(text.clone()));
            }
            None => warn!("Draft reply had no content"),
        }
        Ok(draft)
    }

    /// Self-check state: ask whether `draft` is fully grounded.
    ///
    /// An unpaired repair request is answered with a placeholder result
    /// for each withheld call plus a corrective user turn, then retried up
    /// to `pairing_retries` times. A reply that neither accepts nor calls
    /// tools counts as an unpaired request with no calls.
    pub fn self_check(
        &self,
        transcript: &mut Vec<Message>,
        draft: &str,
    ) -> Result<SelfCheckOutcome, AgentError> {
        transcript.push(Message::user(self_check_prompt(draft)));

        let mut attempt = 0;
        loop {
            let reply = self.call(transcript, &self.tools)?;

            if reply.is_accepted() {
                transcript.push(reply.to_message());
                return Ok(SelfCheckOutcome::Accepted);
            }
            if reply.tool_calls.is_empty() && reply.text_content().is_none() {
                warn!("Self-check reply had neither content nor tool calls");
                return Ok(SelfCheckOutcome::NoProgress);
            }

            transcript.push(reply.to_message());
            if is_paired(&reply.tool_calls) {
                debug!("Self-check requested {} tool calls", reply.tool_calls.len());
                return Ok(SelfCheckOutcome::Repair(reply.tool_calls));
            }

            let called: Vec<&str> = reply.tool_calls.iter().map(|c| c.name.as_str()).collect();
            warn!(
                "Unpaired self-check reply (attempt {} of {}): called {:?}",
                attempt + 1,
                self.pairing_retries + 1,
                called
            );

            if attempt >= self.pairing_retries {
                return Ok(SelfCheckOutcome::Unpaired(reply.tool_calls));
            }
            attempt += 1;

            for call in &reply.tool_calls {
                transcript.push(Message::tool_result(call.id.clone(), UNPAIRED_RESULT));
            }
            transcript.push(Message::user(pairing_correction(&called)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mender_domain::Role;
    use mender_llm::MockModel;

    fn log_call() -> ToolCall {
        ToolCall::new("log_uncertainty", r#"{"reason": "Timing not specified"}"#)
    }

    fn update_call() -> ToolCall {
        ToolCall::new("update_kb", r#"{"doc_id": "1", "new_content": {}}"#)
    }

    #[test]
    fn test_pairing_rule() {
        assert!(is_paired(&[log_call(), update_call()]));
        assert!(is_paired(&[
            ToolCall::new("search_kb", "{}"),
            update_call(),
            log_call()
        ]));
        assert!(!is_paired(&[log_call()]));
        assert!(!is_paired(&[update_call(), update_call()]));
        assert!(!is_paired(&[]));
    }

    #[test]
    fn test_draft_appends_turns() {
        let model = MockModel::new([ModelReply::text("20 days per year.")]);
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = vec![Message::system("s")];

        let draft = driver.draft(&mut transcript, "Found:\n", "Vacation?").unwrap();

        assert_eq!(draft.as_deref(), Some("20 days per year."));
        let roles: Vec<_> = transcript.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn test_empty_draft() {
        let model = MockModel::new([ModelReply::empty()]);
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = Vec::new();
        assert_eq!(driver.draft(&mut transcript, "ctx", "q").unwrap(), None);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_self_check_accepts() {
        let model = MockModel::new([ModelReply::accept()]);
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = Vec::new();
        assert_eq!(
            driver.self_check(&mut transcript, "draft").unwrap(),
            SelfCheckOutcome::Accepted
        );
    }

    #[test]
    fn test_self_check_repair_keeps_order() {
        let calls = vec![log_call(), update_call()];
        let model = MockModel::new([ModelReply::with_tool_calls(calls.clone())]);
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = Vec::new();

        let outcome = driver.self_check(&mut transcript, "draft").unwrap();
        assert_eq!(outcome, SelfCheckOutcome::Repair(calls.clone()));
        assert_eq!(transcript.last().unwrap().tool_calls, calls);
    }

    #[test]
    fn test_unpaired_then_paired_on_retry() {
        let paired = vec![log_call(), update_call()];
        let model = MockModel::new([
            ModelReply::with_tool_calls(vec![log_call()]),
            ModelReply::with_tool_calls(paired.clone()),
        ]);
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = Vec::new();

        let outcome = driver.self_check(&mut transcript, "draft").unwrap();
        assert_eq!(outcome, SelfCheckOutcome::Repair(paired));
        assert_eq!(model.call_count(), 2);

        // The retry saw the withheld call's placeholder and the correction
        let second = &model.transcripts()[1];
        let n = second.len();
        assert_eq!(second[n - 2].role, Role::Tool);
        assert_eq!(second[n - 2].content, UNPAIRED_RESULT);
        assert!(second[n - 1].content.contains("called log_uncertainty"));
    }

    #[test]
    fn test_unpaired_exhausts_retries() {
        let model = MockModel::new([ModelReply::with_tool_calls(vec![update_call()])]);
        let driver = ConversationDriver::new(&model, 2);
        let mut transcript = Vec::new();

        let outcome = driver.self_check(&mut transcript, "draft").unwrap();
        assert!(matches!(outcome, SelfCheckOutcome::Unpaired(calls) if calls.len() == 1));
        assert_eq!(model.call_count(), 3);
    }

    #[test]
    fn test_text_without_verdict_is_unpaired() {
        let model = MockModel::new([ModelReply::text("NO, the duration is missing")]);
        let driver = ConversationDriver::new(&model, 0);
        let mut transcript = Vec::new();

        let outcome = driver.self_check(&mut transcript, "draft").unwrap();
        assert_eq!(outcome, SelfCheckOutcome::Unpaired(Vec::new()));
        assert_eq!(model.call_count(), 1);
    }

    #[test]
    fn test_empty_self_check_is_no_progress() {
        let model = MockModel::new([ModelReply::empty()]);
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = Vec::new();
        assert_eq!(
            driver.self_check(&mut transcript, "draft").unwrap(),
            SelfCheckOutcome::NoProgress
        );
    }

    #[test]
    fn test_model_error_is_fatal() {
        let mut model = MockModel::default();
        model.push_error("connection refused");
        let driver = ConversationDriver::new(&model, 1);
        let mut transcript = Vec::new();

        let err = driver.draft(&mut transcript, "ctx", "q").unwrap_err();
        assert!(matches!(err, AgentError::Model(m) if m.contains("connection refused")));
    }
}
