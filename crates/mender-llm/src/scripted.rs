//! Rule-driven chat model
//!
//! `ScriptedModel` answers the two prompts the repair loop sends (draft and
//! self-check) from a small table of topic rules. It needs no network and
//! is deterministic, which makes it the default model of the CLI and the
//! workhorse of the end-to-end tests.
//!
//! - **Draft prompt** (contains `Produce a draft answer`): the `Question:`
//!   line selects a [`DraftRule`]. The rule's document is looked up in the
//!   `Context:` block; if it is rendered with an `Inferred:` line the
//!   annotated draft is returned, otherwise the draft that admits the gap.
//! - **Self-check prompt** (contains `Self-check`): the `Answer:` line is
//!   matched against the [`RepairRule`]s. A match yields a paired
//!   `log_uncertainty` + `update_kb` call; no match yields acceptance.

use crate::LlmError;
use mender_domain::traits::ChatModel;
use mender_domain::{Message, ModelReply, ToolCall, ToolDefinition, ToolKind};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Keyword groups: every group must have at least one keyword present
type Keywords = Vec<Vec<String>>;

fn keywords(groups: &[&[&str]]) -> Keywords {
    groups
        .iter()
        .map(|g| g.iter().map(|k| k.to_lowercase()).collect())
        .collect()
}

fn matches(text: &str, groups: &Keywords) -> bool {
    groups
        .iter()
        .all(|group| group.iter().any(|k| text.contains(k.as_str())))
}

/// Which draft to write for a topic
#[derive(Debug, Clone)]
pub struct DraftRule {
    question: Keywords,
    doc_id: String,
    unannotated: String,
    annotated: String,
}

impl DraftRule {
    /// Rule for questions matching every keyword group.
    ///
    /// `unannotated` is used while `doc_id` has no inferred facts in the
    /// context, `annotated` once it has.
    pub fn new(
        question: &[&[&str]],
        doc_id: impl Into<String>,
        unannotated: impl Into<String>,
        annotated: impl Into<String>,
    ) -> Self {
        Self {
            question: keywords(question),
            doc_id: doc_id.into(),
            unannotated: unannotated.into(),
            annotated: annotated.into(),
        }
    }
}

/// Which repair to request for a draft
#[derive(Debug, Clone)]
pub struct RepairRule {
    answer: Keywords,
    reason: String,
    doc_id: String,
    fact_key: String,
    annotation: Value,
}

impl RepairRule {
    /// Rule for drafts matching every keyword group
    pub fn new(
        answer: &[&[&str]],
        reason: impl Into<String>,
        doc_id: impl Into<String>,
        fact_key: impl Into<String>,
        annotation: Value,
    ) -> Self {
        Self {
            answer: keywords(answer),
            reason: reason.into(),
            doc_id: doc_id.into(),
            fact_key: fact_key.into(),
            annotation,
        }
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        let log = json!({ "reason": self.reason });
        let update = json!({
            "doc_id": self.doc_id,
            "new_content": { self.fact_key.clone(): self.annotation },
        });
        vec![
            ToolCall::new(ToolKind::LogUncertainty.as_str(), log.to_string()),
            ToolCall::new(ToolKind::UpdateKb.as_str(), update.to_string()),
        ]
    }
}

/// Deterministic rule-driven model
///
/// # Examples
///
/// ```
/// use mender_domain::traits::ChatModel;
/// use mender_domain::Message;
/// use mender_llm::ScriptedModel;
///
/// let model = ScriptedModel::leave_policies();
/// let prompt = Message::user(
///     "Context:\nNo documents found\n\nQuestion: Who is the CEO?\n\nProduce a draft answer.",
/// );
/// let reply = model.complete(&[prompt], &[]).unwrap();
/// assert_eq!(reply.content.as_deref(), Some("No policy found."));
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    drafts: Vec<DraftRule>,
    repairs: Vec<RepairRule>,
    fallback: String,
    call_count: Arc<Mutex<usize>>,
}

impl ScriptedModel {
    /// Empty rule table answering every question with `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            drafts: Vec::new(),
            repairs: Vec::new(),
            fallback: fallback.into(),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Add a draft rule; rules are tried in insertion order
    pub fn with_draft(mut self, rule: DraftRule) -> Self {
        self.drafts.push(rule);
        self
    }

    /// Add a repair rule; rules are tried in insertion order
    pub fn with_repair(mut self, rule: RepairRule) -> Self {
        self.repairs.push(rule);
        self
    }

    /// Rules for the vacation / sick leave / parental leave handbook
    /// (documents `1`, `2` and `3`)
    pub fn leave_policies() -> Self {
        let unused_days = json!({
            "status": "expire",
            "assumption": "Expiration at end of calendar year unless specified",
            "confidence": 0.35,
            "source": "agent_inferred"
        });

        Self::new("No policy found.")
            .with_draft(DraftRule::new(
                &[&["parental", "maternity"]],
                "3",
                "Maternity leave available but details missing.",
                "Maternity leave available. We assume 12 weeks duration based on typical policies.",
            ))
            .with_draft(DraftRule::new(
                &[&["sick"]],
                "2",
                "Sick leave needs manager approval. No limit specified.",
                "Sick leave needs manager approval. We assume 10 days per year.",
            ))
            .with_draft(DraftRule::new(
                &[&["carry"]],
                "1",
                "Policy says days expire but timing unclear, carryover unknown.",
                "Vacation days expire end of calendar year, cannot carry over.",
            ))
            .with_draft(DraftRule::new(
                &[&["vacation"], &["manager", "approval"]],
                "1",
                "Vacation policy doesnt mention manager approval.",
                "Vacation policy doesnt mention manager approval.",
            ))
            .with_draft(DraftRule::new(
                &[&["vacation"]],
                "1",
                "20 days paid vacation per year. Days expire but timing unclear.",
                "20 days paid vacation per year. Unused days expire end of calendar year.",
            ))
            .with_repair(RepairRule::new(
                &[&["vacation"], &["unclear"]],
                "Timing not specified",
                "1",
                "unused_days",
                unused_days.clone(),
            ))
            .with_repair(RepairRule::new(
                &[&["sick"], &["no limit"]],
                "Duration not specified",
                "2",
                "annual_limit",
                json!({
                    "days": 10,
                    "assumption": "Typical allowance absent policy",
                    "confidence": 0.3,
                    "source": "agent_inferred"
                }),
            ))
            .with_repair(RepairRule::new(
                &[&["parental", "maternity"], &["missing"]],
                "Duration not documented",
                "3",
                "duration",
                json!({
                    "weeks": 12,
                    "assumption": "Standard duration when not specified",
                    "confidence": 0.25,
                    "source": "agent_inferred"
                }),
            ))
            .with_repair(RepairRule::new(
                &[&["carryover"], &["unknown"]],
                "Carryover unclear",
                "1",
                "unused_days",
                unused_days,
            ))
    }

    /// Get the number of times `complete` was called
    pub fn call_count(&self) -> usize {
        *self
            .call_count
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn draft(&self, prompt: &str) -> ModelReply {
        let question = labelled_line(prompt, "question:").unwrap_or_default();
        let annotated = annotated_ids(prompt);

        let content = self
            .drafts
            .iter()
            .find(|rule| matches(&question, &rule.question))
            .map(|rule| {
                if annotated.contains(rule.doc_id.as_str()) {
                    rule.annotated.clone()
                } else {
                    rule.unannotated.clone()
                }
            })
            .unwrap_or_else(|| self.fallback.clone());

        ModelReply::text(content)
    }

    fn self_check(&self, prompt: &str) -> ModelReply {
        let answer = labelled_line(prompt, "answer:").unwrap_or_default();

        match self.repairs.iter().find(|rule| matches(&answer, &rule.answer)) {
            Some(rule) => ModelReply::with_tool_calls(rule.tool_calls()),
            None => ModelReply::accept(),
        }
    }
}

/// First line starting with `label` (case-insensitive), lowercased
fn labelled_line(prompt: &str, label: &str) -> Option<String> {
    prompt
        .lines()
        .map(str::to_lowercase)
        .find(|line| line.starts_with(label))
}

/// Ids of documents rendered with an `Inferred:` line
fn annotated_ids(prompt: &str) -> HashSet<&str> {
    let mut ids = HashSet::new();
    let mut current = None;
    for line in prompt.lines() {
        if let Some(rest) = line.strip_prefix("ID: ") {
            current = rest.split(',').next();
        } else if line.starts_with("Inferred:") {
            if let Some(id) = current {
                ids.insert(id);
            }
        }
    }
    ids
}

impl ChatModel for ScriptedModel {
    type Error = LlmError;

    fn complete(
        &self,
        transcript: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ModelReply, Self::Error> {
        *self
            .call_count
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;

        let Some(last) = transcript.last() else {
            return Err(LlmError::InvalidResponse("Empty transcript".to_string()));
        };
        let lower = last.content.to_lowercase();

        if lower.contains("produce a draft") {
            Ok(self.draft(&last.content))
        } else if lower.contains("self-check") {
            Ok(self.self_check(&last.content))
        } else {
            Ok(ModelReply::text("OK"))
        }
    }
}
