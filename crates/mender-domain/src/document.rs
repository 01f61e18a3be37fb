//! Documents and agent-inferred annotations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved `source` tag carried by every annotation the agent writes.
///
/// Anything else in the `source` field means the annotation did not come
/// from the repair path and must be refused.
pub const AGENT_INFERRED_SOURCE: &str = "agent_inferred";

/// Fact key → annotation, ordered by key so the persisted file is stable.
pub type InferredMap = BTreeMap<String, Annotation>;

/// A document of the knowledge base.
///
/// The store owns every document; the only mutation path is merging
/// annotations into [`Document::inferred`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique, stable identifier
    pub id: String,

    /// Human readable title
    pub title: String,

    /// Body text
    pub content: String,

    /// Facts the agent inferred to fill gaps in `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred: Option<InferredMap>,
}

impl Document {
    /// Create a document without annotations
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            inferred: None,
        }
    }

    /// Whether at least one annotation has been patched onto this document
    pub fn is_annotated(&self) -> bool {
        self.inferred.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// Look up a single annotation by fact key
    pub fn annotation(&self, key: &str) -> Option<&Annotation> {
        self.inferred.as_ref().and_then(|m| m.get(key))
    }

    /// Merge annotations into the inferred map.
    ///
    /// Same-named keys are overwritten, unrelated keys are left alone.
    pub fn merge_inferred(&mut self, patch: InferredMap) {
        self.inferred.get_or_insert_with(BTreeMap::new).extend(patch);
    }
}

/// An agent-derived fact with its rationale and confidence.
///
/// Besides the three required fields an annotation keeps whatever
/// fact-specific fields the model supplied (`status`, `days`, `weeks`...)
/// verbatim in [`Annotation::fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Free-text rationale for the inferred value
    pub assumption: String,

    /// Confidence in (0, 1]
    pub confidence: f64,

    /// Provenance tag, always [`AGENT_INFERRED_SOURCE`] once admitted
    pub source: String,

    /// Fact-specific values
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Annotation {
    /// Create an agent-inferred annotation with no extra fields
    pub fn new(assumption: impl Into<String>, confidence: f64) -> Self {
        Self {
            assumption: assumption.into(),
            confidence,
            source: AGENT_INFERRED_SOURCE.to_string(),
            fields: Map::new(),
        }
    }

    /// Attach a fact-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Whether the provenance tag is the reserved agent tag
    pub fn is_agent_inferred(&self) -> bool {
        self.source == AGENT_INFERRED_SOURCE
    }

    /// Render as a JSON value (the shape used on the wire and on disk)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
