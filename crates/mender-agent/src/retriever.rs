//! Lexical retrieval over the document store
//!
//! A document scores one point per distinct query token found as a
//! substring of its title and content (case-insensitive). Zero-score
//! documents are dropped, ties keep store order.

use mender_domain::Document;
use std::fmt::Write as _;
use tracing::debug;

/// Rendering of an empty result set
pub const NO_DOCUMENTS: &str = "No documents found";

/// Top-K lexical retriever
#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    top_k: usize,
}

impl Retriever {
    /// Create a retriever returning at most `top_k` documents
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Result limit
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rank `documents` against `query`
    pub fn search<'a>(&self, documents: &'a [Document], query: &str) -> Vec<&'a Document> {
        let tokens = tokenize(query);

        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .filter_map(|doc| {
                let text = format!("{} {}", doc.title, doc.content).to_lowercase();
                let score = tokens.iter().filter(|t| text.contains(t.as_str())).count();
                (score > 0).then_some((score, doc))
            })
            .collect();

        // sort_by is stable, so equal scores stay in store order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        debug!(
            "Query {:?} matched {} of {} documents",
            query,
            scored.len(),
            documents.len()
        );

        scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, doc)| doc)
            .collect()
    }

    /// Search and render the result as model context
    pub fn context(&self, documents: &[Document], query: &str) -> String {
        render(&self.search(documents, query))
    }
}

/// Lowercased whitespace tokens, first occurrence kept
fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query.split_whitespace().map(str::to_lowercase) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Render documents for the model, or [`NO_DOCUMENTS`] when empty.
///
/// Annotated documents carry an `Inferred:` line with the compact JSON of
/// their inferred map.
pub fn render(documents: &[&Document]) -> String {
    if documents.is_empty() {
        return NO_DOCUMENTS.to_string();
    }

    let mut out = String::from("Found:\n");
    for doc in documents {
        let _ = writeln!(out, "ID: {}, Title: {}", doc.id, doc.title);
        let _ = writeln!(out, "{}", doc.content);
        if let Some(inferred) = doc.inferred.as_ref().filter(|m| !m.is_empty()) {
            let json = serde_json::to_string(inferred).unwrap_or_default();
            let _ = writeln!(out, "Inferred: {}", json);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mender_domain::{Annotation, InferredMap};

    fn handbook() -> Vec<Document> {
        vec![
            Document::new(
                "1",
                "Vacation Policy",
                "Full-time employees receive 20 days paid vacation per year. Unused days expire.",
            ),
            Document::new(
                "2",
                "Sick Leave Policy",
                "Sick leave needs manager approval for absences longer than three days.",
            ),
            Document::new("3", "Parental Leave Policy", "Parental leave is available."),
        ]
    }

    #[test]
    fn test_ranks_by_token_overlap() {
        let docs = handbook();
        let hits = Retriever::new(3).search(&docs, "sick leave approval");
        let ids: Vec<_> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["2", "3"]);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let docs = handbook();
        let hits = Retriever::new(3).search(&docs, "policy");
        let ids: Vec<_> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn test_top_k_limit() {
        let docs = handbook();
        assert_eq!(Retriever::new(1).search(&docs, "policy").len(), 1);
    }

    #[test]
    fn test_case_insensitive_and_deduplicated() {
        let docs = handbook();
        // "VACATION vacation" counts once, so doc 1 ties with nothing else
        let hits = Retriever::new(3).search(&docs, "VACATION vacation");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
        assert_eq!(tokenize("Leave leave LEAVE"), ["leave"]);
    }

    #[test]
    fn test_render_sentinel() {
        let docs = handbook();
        assert_eq!(Retriever::new(3).context(&docs, "quantum"), NO_DOCUMENTS);
        assert_eq!(Retriever::new(3).context(&docs, ""), NO_DOCUMENTS);
        assert_eq!(Retriever::new(3).context(&[], "vacation"), NO_DOCUMENTS);
    }

    #[test]
    fn test_render_includes_inferred() {
        let mut docs = handbook();
        docs[0].merge_inferred(InferredMap::from([(
            "unused_days".to_string(),
            Annotation::new("Expiration at end of calendar year unless specified", 0.35)
                .with_field("status", "expire"),
        )]));

        let context = Retriever::new(3).context(&docs, "vacation");
        assert!(context.starts_with("Found:\nID: 1, Title: Vacation Policy\n"));
        let inferred = context.lines().find(|l| l.starts_with("Inferred: ")).unwrap();
        assert!(inferred.contains(r#""unused_days""#));
        assert!(inferred.contains(r#""confidence":0.35"#));
        assert!(context.ends_with("\n\n"));
    }
}
