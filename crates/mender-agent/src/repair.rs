//! The bounded repair loop

use crate::approval::{AutoApprove, UpdateApproval};
use crate::config::{AgentConfig, TranscriptMode};
use crate::dispatcher::ToolDispatcher;
use crate::driver::{ConversationDriver, SelfCheckOutcome};
use crate::error::AgentError;
use crate::prompt::SYSTEM_PROMPT;
use crate::retriever::{render, Retriever};
use crate::types::{IterationState, IterationTrace, RepairOutcome, Termination, ToolExchange};
use mender_domain::traits::{ChatModel, DocumentStore};
use mender_domain::{Message, UncertaintyLog};
use std::fmt::Display;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Answers questions from a document store, repairing the store when the
/// model finds its own draft ungrounded
pub struct RepairLoop<S, M> {
    store: S,
    model: M,
    approval: Box<dyn UpdateApproval>,
    config: AgentConfig,
}

impl<S, M> RepairLoop<S, M>
where
    S: DocumentStore,
    S::Error: Display,
    M: ChatModel,
    M::Error: Display,
{
    /// Create a loop with the default configuration and automatic approval
    pub fn new(store: S, model: M) -> Self {
        Self {
            store,
            model,
            approval: Box::new(AutoApprove),
            config: AgentConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: AgentConfig) -> Result<Self, AgentError> {
        config.validate().map_err(AgentError::Config)?;
        self.config = config;
        Ok(self)
    }

    /// Gate `update_kb` calls through `approval`
    pub fn with_approval(mut self, approval: impl UpdateApproval + 'static) -> Self {
        self.approval = Box::new(approval);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Give back the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Answer `question`, repairing the store as needed.
    ///
    /// Reloads the store and starts a fresh uncertainty log. Runs at most
    /// `max_iterations` draft / self-check cycles; a cycle that repairs
    /// always leads to another cycle (or to exhaustion), never straight to
    /// a return.
    ///
    /// # Errors
    ///
    /// Only a store that cannot be loaded or a failing model call is an
    /// error. Every other outcome is reported in [`RepairOutcome`].
    pub fn answer(&mut self, question: &str) -> Result<RepairOutcome, AgentError> {
        reload(&mut self.store)?;

        let session_id = Uuid::now_v7().to_string();
        let retriever = Retriever::new(self.config.top_k);
        let driver = ConversationDriver::new(&self.model, self.config.pairing_retries);
        let mut log = UncertaintyLog::new();
        let mut transcript: Vec<Message> = Vec::new();
        let mut trace = Vec::new();
        let mut draft = String::new();
        let mut termination = Termination::Exhausted;

        info!("Session {}: answering {:?}", session_id, question);

        for iteration in 1..=self.config.max_iterations {
            if transcript.is_empty() || self.config.transcript_mode == TranscriptMode::Fresh {
                transcript = vec![Message::system(SYSTEM_PROMPT)];
            }

            let hits = retriever.search(self.store.documents(), question);
            let groundable = !hits.is_empty();
            let context = render(&hits);

            let Some(text) = driver.draft(&mut transcript, &context, question)? else {
                trace.push(IterationTrace {
                    iteration,
                    draft: None,
                    state: IterationState::NoProgress,
                    tools: Vec::new(),
                });
                termination = Termination::NoProgress;
                break;
            };
            draft = text;

            if !groundable && !self.config.check_ungroundable {
                debug!("No documents matched; skipping self-check");
                trace.push(IterationTrace {
                    iteration,
                    draft: Some(draft.clone()),
                    state: IterationState::Ungroundable,
                    tools: Vec::new(),
                });
                termination = Termination::Ungroundable;
                break;
            }

            match driver.self_check(&mut transcript, &draft)? {
                SelfCheckOutcome::Accepted => {
                    info!("Iteration {}: draft accepted", iteration);
                    trace.push(IterationTrace {
                        iteration,
                        draft: Some(draft.clone()),
                        state: IterationState::Accepted,
                        tools: Vec::new(),
                    });
                    termination = Termination::Accepted;
                    break;
                }
                SelfCheckOutcome::NoProgress => {
                    trace.push(IterationTrace {
                        iteration,
                        draft: Some(draft.clone()),
                        state: IterationState::NoProgress,
                        tools: Vec::new(),
                    });
                    termination = Termination::NoProgress;
                    break;
                }
                SelfCheckOutcome::Unpaired(calls) => {
                    warn!(
                        "Iteration {}: self-check requested {} unpaired tool calls; stopping",
                        iteration,
                        calls.len()
                    );
                    trace.push(IterationTrace {
                        iteration,
                        draft: Some(draft.clone()),
                        state: IterationState::Unpaired,
                        tools: Vec::new(),
                    });
                    termination = Termination::ProtocolViolation;
                    break;
                }
                SelfCheckOutcome::Repair(calls) => {
                    let mut dispatcher = ToolDispatcher::new(
                        &mut self.store,
                        &mut log,
                        retriever,
                        self.approval.as_ref(),
                    );
                    let mut tools = Vec::with_capacity(calls.len());
                    for call in calls {
                        let result = dispatcher.dispatch(&call.name, &call.arguments);
                        transcript.push(Message::tool_result(call.id, result.clone()));
                        tools.push(ToolExchange {
                            name: call.name,
                            arguments: call.arguments,
                            result,
                        });
                    }
                    info!("Iteration {}: dispatched {} repair calls", iteration, tools.len());
                    trace.push(IterationTrace {
                        iteration,
                        draft: Some(draft.clone()),
                        state: IterationState::Repaired,
                        tools,
                    });

                    // update_kb persisted; the next retrieval must see it
                    reload(&mut self.store)?;
                }
            }
        }

        if termination == Termination::Exhausted {
            info!("Iteration cap {} reached; returning last draft", self.config.max_iterations);
        }

        Ok(RepairOutcome {
            session_id,
            question: question.to_string(),
            answer: draft,
            uncertainties: log.into_records(),
            iterations: trace.len(),
            termination,
            trace,
        })
    }
}

fn reload<S>(store: &mut S) -> Result<(), AgentError>
where
    S: DocumentStore,
    S::Error: Display,
{
    store.load().map_err(|e| AgentError::Store(e.to_string()))
}
