//! Tool call dispatch
//!
//! Every path returns a string that becomes the tool-result turn; nothing
//! here fails across the loop boundary.

use crate::approval::UpdateApproval;
use crate::retriever::{render, Retriever};
use mender_domain::traits::DocumentStore;
use mender_domain::{ToolKind, UncertaintyLog};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchParams {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogParams {
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateParams {
    doc_id: String,
    new_content: Map<String, Value>,
}

/// Routes tool calls to the store, the retriever and the session's
/// uncertainty log
pub struct ToolDispatcher<'a, S> {
    store: &'a mut S,
    log: &'a mut UncertaintyLog,
    retriever: Retriever,
    approval: &'a dyn UpdateApproval,
}

impl<'a, S> ToolDispatcher<'a, S>
where
    S: DocumentStore,
    S::Error: Display,
{
    /// Create a dispatcher for one session
    pub fn new(
        store: &'a mut S,
        log: &'a mut UncertaintyLog,
        retriever: Retriever,
        approval: &'a dyn UpdateApproval,
    ) -> Self {
        Self {
            store,
            log,
            retriever,
            approval,
        }
    }

    /// Run tool `name` with JSON `arguments`
    pub fn dispatch(&mut self, name: &str, arguments: &str) -> String {
        let Some(kind) = ToolKind::parse(name) else {
            warn!("Model called unknown tool '{}'", name);
            return format!("Unknown tool: {}", name);
        };

        let result = match kind {
            ToolKind::SearchKb => parse::<SearchParams>(kind, arguments).map(|p| self.search(&p.query)),
            ToolKind::LogUncertainty => parse::<LogParams>(kind, arguments).map(|p| self.log(p.reason)),
            ToolKind::UpdateKb => {
                parse::<UpdateParams>(kind, arguments).map(|p| self.update(&p.doc_id, &p.new_content))
            }
        };

        result.unwrap_or_else(|message| {
            warn!("{}", message);
            message
        })
    }

    fn search(&self, query: &str) -> String {
        let hits = self.retriever.search(self.store.documents(), query);
        debug!("search_kb({:?}) returned {} documents", query, hits.len());
        render(&hits)
    }

    fn log(&mut self, reason: String) -> String {
        let record = self.log.record(reason);
        info!("Logged uncertainty #{}: {}", record.index, record.reason);
        format!("Logged: {}", record.reason)
    }

    fn update(&mut self, doc_id: &str, patch: &Map<String, Value>) -> String {
        if !self.approval.approve(doc_id, patch) {
            info!("Update to {} rejected by operator", doc_id);
            return format!("Update to {} rejected by operator", doc_id);
        }

        match self.store.update(doc_id, patch) {
            Ok(()) => format!("Updated {}", doc_id),
            Err(e) => {
                warn!("update_kb on {} failed: {}", doc_id, e);
                format!("Update to {} failed: {}", doc_id, e)
            }
        }
    }
}

fn parse<T: DeserializeOwned>(kind: ToolKind, arguments: &str) -> Result<T, String> {
    // Some models send no arguments at all for parameterless calls
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments).map_err(|e| format!("Invalid arguments for {}: {}", kind, e))
}
