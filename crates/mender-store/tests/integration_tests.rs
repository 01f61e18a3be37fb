//! Integration tests for mender-store
//!
//! These tests verify the load / get / update / save cycle against real files.

use mender_domain::Annotation;
use mender_gatekeeper::{Gatekeeper, RejectionReason, ValidationConfig};
use mender_store::{DocumentStore, JsonStore, StoreError};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const KB: &str = r#"[
  {"id": "1", "title": "Vacation Policy", "content": "20 days paid vacation per year. Unused days expire."},
  {"id": "2", "title": "Sick Leave Policy", "content": "Sick leave needs manager approval."}
]"#;

fn write_kb(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("knowledge.json");
    std::fs::write(&path, contents).unwrap();
    path
}

fn patch(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn unused_days() -> Value {
    json!({
        "status": "expire",
        "assumption": "Expiration at end of calendar year unless specified",
        "confidence": 0.35,
        "source": "agent_inferred"
    })
}

fn on_disk(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_open_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(write_kb(&dir, KB)).unwrap();

    assert_eq!(store.documents().len(), 2);
    assert_eq!(store.get("1").unwrap().title, "Vacation Policy");
    assert!(store.get("9").is_none());
    assert!(matches!(store.require("9"), Err(StoreError::NotFound(_))));
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = JsonStore::open(dir.path().join("absent.json"));
    assert!(matches!(result, Err(StoreError::Missing(_))));
}

#[test]
fn test_malformed_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = JsonStore::open(write_kb(&dir, r#"[{"id": "1", "title": "x"}]"#));
    assert!(matches!(result, Err(StoreError::Parse { .. })));
}

#[test]
fn test_duplicate_ids_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let kb = r#"[
        {"id": "1", "title": "a", "content": "a"},
        {"id": "1", "title": "b", "content": "b"}
    ]"#;
    let result = JsonStore::open(write_kb(&dir, kb));
    assert!(matches!(result, Err(StoreError::DuplicateId(id)) if id == "1"));
}

#[test]
fn test_failed_reload_keeps_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kb(&dir, KB);
    let mut store = JsonStore::open(&path).unwrap();

    std::fs::write(&path, "not json").unwrap();
    assert!(store.load().is_err());
    assert_eq!(store.documents().len(), 2);
}

#[test]
fn test_persisted_annotation_with_foreign_source_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let kb = r#"[{"id": "1", "title": "a", "content": "a",
        "inferred": {"unused_days": {"assumption": "x", "confidence": 0.4, "source": "handbook"}}}]"#;
    let result = JsonStore::open(write_kb(&dir, kb));
    match result {
        Err(StoreError::InvalidAnnotation { doc_id, reasons }) => {
            assert_eq!(doc_id, "1");
            assert!(matches!(reasons[0], RejectionReason::SourceMismatch { .. }));
        }
        other => panic!("Expected InvalidAnnotation, got {:?}", other),
    }
}

#[test]
fn test_update_merges_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kb(&dir, KB);
    let mut store = JsonStore::open(&path).unwrap();

    store
        .update("1", &patch(json!({"unused_days": unused_days()})))
        .unwrap();

    let annotation = store.get("1").unwrap().annotation("unused_days").unwrap();
    assert_eq!(annotation.confidence, 0.35);

    // Persisted before returning
    let disk = on_disk(&path);
    assert_eq!(disk[0]["inferred"]["unused_days"]["status"], "expire");
    assert!(disk[1].get("inferred").is_none());

    // And visible to a fresh load
    let reloaded = JsonStore::open(&path).unwrap();
    assert_eq!(reloaded.get("1"), store.get("1"));
}

#[test]
fn test_update_is_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kb(&dir, KB);
    let before = std::fs::read_to_string(&path).unwrap();
    let mut store = JsonStore::open(&path).unwrap();

    let result = store.update(
        "1",
        &patch(json!({
            "unused_days": unused_days(),
            "carryover": {"assumption": "No carryover", "confidence": 0.3}
        })),
    );

    assert!(matches!(result, Err(StoreError::Rejected(_))));
    assert!(store.get("1").unwrap().inferred.is_none());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_update_with_foreign_source_leaves_inferred_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonStore::open(write_kb(&dir, KB)).unwrap();
    store
        .update("1", &patch(json!({"unused_days": unused_days()})))
        .unwrap();
    let before = store.get("1").unwrap().inferred.clone();

    let mut candidate = unused_days();
    candidate["source"] = json!("hr_handbook");
    candidate["assumption"] = json!("Rolls over");
    let err = store
        .update("1", &patch(json!({"unused_days": candidate})))
        .unwrap_err();

    assert!(err.is_rejection());
    assert!(err.to_string().contains("hr_handbook"));
    assert_eq!(store.get("1").unwrap().inferred, before);
}

#[test]
fn test_update_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kb(&dir, KB);
    let mut store = JsonStore::open(&path).unwrap();
    let p = patch(json!({"unused_days": unused_days()}));

    store.update("1", &p).unwrap();
    let once = on_disk(&path);
    store.update("1", &p).unwrap();
    let twice = on_disk(&path);

    assert_eq!(once, twice);
    assert_eq!(store.get("1").unwrap().inferred.as_ref().unwrap().len(), 1);
}

#[test]
fn test_update_keeps_unrelated_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonStore::open(write_kb(&dir, KB)).unwrap();

    store
        .update("2", &patch(json!({"annual_limit": {
            "days": 10, "assumption": "Typical allowance absent policy",
            "confidence": 0.3, "source": "agent_inferred"
        }})))
        .unwrap();
    store
        .update("2", &patch(json!({"approval_threshold": {
            "assumption": "Approval applies after three days",
            "confidence": 0.4, "source": "agent_inferred"
        }})))
        .unwrap();

    let inferred = store.get("2").unwrap().inferred.clone().unwrap();
    assert_eq!(inferred.len(), 2);
    assert_eq!(inferred["annual_limit"].fields["days"], 10);
}

#[test]
fn test_update_unknown_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonStore::open(write_kb(&dir, KB)).unwrap();
    let result = store.update("42", &patch(json!({"unused_days": unused_days()})));
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == "42"));
}

#[test]
fn test_strict_gatekeeper_applies_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonStore::open(write_kb(&dir, KB))
        .unwrap()
        .with_gatekeeper(Gatekeeper::new(ValidationConfig::strict()));

    let mut candidate = unused_days();
    candidate["confidence"] = json!(0.8);
    let result = store.update("1", &patch(json!({"unused_days": candidate})));
    assert!(matches!(result, Err(StoreError::Rejected(_))));
}

#[test]
fn test_export_writes_second_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kb(&dir, KB);
    let mut store = JsonStore::open(&path).unwrap();
    store
        .update("1", &patch(json!({"unused_days": unused_days()})))
        .unwrap();

    let fixed = dir.path().join("knowledge_fixed.json");
    store.export(&fixed).unwrap();

    let exported = JsonStore::open(&fixed).unwrap();
    assert_eq!(exported.documents(), store.documents());
    assert_eq!(store.path(), path.as_path());
    assert_eq!(store.annotated().count(), 1);
}

#[test]
fn test_round_trip_preserves_fact_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonStore::open(write_kb(&dir, KB)).unwrap();
    let expected = Annotation::new("Standard duration when not specified", 0.25).with_field("weeks", 12);

    store
        .update("1", &patch(json!({"duration": expected.to_value()})))
        .unwrap();
    store.load().unwrap();

    assert_eq!(store.get("1").unwrap().annotation("duration"), Some(&expected));
}

#[test]
fn test_failed_persist_rolls_back_merge() {
    let dir = tempfile::tempdir().unwrap();
    let kb_dir = dir.path().join("kb");
    std::fs::create_dir(&kb_dir).unwrap();
    let path = kb_dir.join("knowledge.json");
    std::fs::write(&path, KB).unwrap();

    let mut store = JsonStore::open(&path).unwrap();
    std::fs::remove_dir_all(&kb_dir).unwrap();

    let result = store.update("1", &patch(json!({"unused_days": unused_days()})));
    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert!(!result.unwrap_err().is_rejection());
    assert_eq!(store.get("1").unwrap().inferred, None);
}

#[test]
fn test_key_written_under_permissive_config_reloads_with_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kb(&dir, KB);
    let mut store = JsonStore::open(&path)
        .unwrap()
        .with_gatekeeper(Gatekeeper::new(ValidationConfig::permissive()));
    store
        .update("1", &patch(json!({"unused days": unused_days()})))
        .unwrap();

    let reopened = JsonStore::open(&path).unwrap();
    assert!(reopened.get("1").unwrap().annotation("unused days").is_some());
}

#[test]
fn test_serialize_error_does_not_blame_the_file() {
    let source = serde_json::from_str::<Value>("{").unwrap_err();
    let err = StoreError::Serialize {
        path: PathBuf::from("knowledge.json"),
        source,
    };
    let message = err.to_string();
    assert!(message.starts_with("Failed to serialize documents for knowledge.json"));
    assert!(!message.contains("Malformed"));
}
