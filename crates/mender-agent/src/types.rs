//! Result types of an `answer` session

use mender_domain::UncertaintyRecord;
use serde::{Deserialize, Serialize};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Self-check accepted the draft
    Accepted,
    /// The iteration cap was reached; the answer is the last draft
    Exhausted,
    /// Retrieval found nothing, so there was nothing to check
    Ungroundable,
    /// The model returned an empty reply
    NoProgress,
    /// Self-check kept requesting repairs without pairing
    /// `log_uncertainty` with `update_kb`
    ProtocolViolation,
}

impl Termination {
    /// Whether the answer was verified by a self-check
    pub fn is_accepted(&self) -> bool {
        matches!(self, Termination::Accepted)
    }

    /// Short human readable label
    pub fn describe(&self) -> &'static str {
        match self {
            Termination::Accepted => "accepted by self-check",
            Termination::Exhausted => "iteration limit reached (best effort)",
            Termination::Ungroundable => "no matching documents, self-check skipped",
            Termination::NoProgress => "model made no progress",
            Termination::ProtocolViolation => "self-check did not pair log_uncertainty with update_kb",
        }
    }
}

/// How a single iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationState {
    /// Draft accepted
    Accepted,
    /// Repair tools dispatched, loop continues
    Repaired,
    /// Self-check skipped for an ungroundable question
    Ungroundable,
    /// Empty model reply
    NoProgress,
    /// Unpaired repair request, nothing dispatched
    Unpaired,
}

/// One dispatched tool call and its textual result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExchange {
    /// Tool name as called
    pub name: String,
    /// Raw JSON arguments
    pub arguments: String,
    /// Text returned to the model
    pub result: String,
}

/// Record of one draft / self-check cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationTrace {
    /// 1-based iteration number
    pub iteration: usize,
    /// Draft produced in this iteration
    pub draft: Option<String>,
    /// Outcome
    pub state: IterationState,
    /// Tools dispatched after the self-check
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolExchange>,
}

/// Result of [`crate::RepairLoop::answer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    /// UUIDv7 of the session
    pub session_id: String,
    /// The question asked
    pub question: String,
    /// Final answer text (the last draft)
    pub answer: String,
    /// Gaps logged during the session
    pub uncertainties: Vec<UncertaintyRecord>,
    /// Iterations run
    pub iterations: usize,
    /// Why the loop stopped
    pub termination: Termination,
    /// Per-iteration trace
    pub trace: Vec<IterationTrace>,
}

impl RepairOutcome {
    /// Number of `update_kb` calls that reported success
    pub fn updates_applied(&self) -> usize {
        self.trace
            .iter()
            .flat_map(|t| &t.tools)
            .filter(|t| t.name == "update_kb" && t.result.starts_with("Updated "))
            .count()
    }
}
