//! Operator approval for knowledge base updates

use serde_json::{Map, Value};

/// Decides whether an `update_kb` call may touch the store
pub trait UpdateApproval {
    /// Return `true` to let the patch through to the store
    fn approve(&self, doc_id: &str, patch: &Map<String, Value>) -> bool;
}

/// Approves every update
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl UpdateApproval for AutoApprove {
    fn approve(&self, _doc_id: &str, _patch: &Map<String, Value>) -> bool {
        true
    }
}

/// Rejects every update, leaving the store read-only
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl UpdateApproval for DenyAll {
    fn approve(&self, _doc_id: &str, _patch: &Map<String, Value>) -> bool {
        false
    }
}

impl<F> UpdateApproval for F
where
    F: Fn(&str, &Map<String, Value>) -> bool,
{
    fn approve(&self, doc_id: &str, patch: &Map<String, Value>) -> bool {
        self(doc_id, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policies() {
        let patch = Map::new();
        assert!(AutoApprove.approve("1", &patch));
        assert!(!DenyAll.approve("1", &patch));
    }

    #[test]
    fn test_closure_policy() {
        let only_doc_one = |doc_id: &str, _: &Map<String, Value>| doc_id == "1";
        assert!(only_doc_one.approve("1", &Map::new()));
        assert!(!only_doc_one.approve("2", &Map::new()));
    }
}
