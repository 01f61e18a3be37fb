//! Mender Storage Layer
//!
//! Implements the `DocumentStore` trait on top of a single JSON file.
//!
//! # Architecture
//!
//! - The whole collection lives in memory between `load` and `save`
//! - Every successful `update` rewrites the file wholesale before returning
//! - Writes go through a temp file + rename, so a concurrent reader never
//!   observes a half-written file
//! - Annotation patches are validated by the Gatekeeper; a rejected patch
//!   writes nothing
//!
//! # Examples
//!
//! ```no_run
//! use mender_store::{DocumentStore, JsonStore};
//!
//! let store = JsonStore::open("knowledge.json").unwrap();
//! println!("{} documents", store.documents().len());
//! ```

#![warn(missing_docs)]

mod atomic;

pub use mender_domain::traits::DocumentStore;
use mender_domain::Document;
use mender_gatekeeper::{Gatekeeper, RejectionReason, ValidationStatus};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing file does not exist
    #[error("Store file not found: {}", .0.display())]
    Missing(PathBuf),

    /// Reading or writing the backing file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a valid document collection
    #[error("Malformed store file {}: {source}", path.display())]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory collection could not be encoded
    #[error("Failed to serialize documents for {}: {source}", path.display())]
    Serialize {
        /// Destination file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Two documents share an identifier
    #[error("Duplicate document id: {0}")]
    DuplicateId(String),

    /// A persisted annotation is malformed
    #[error("Invalid annotation on document {doc_id}: {}", join_reasons(reasons))]
    InvalidAnnotation {
        /// Document carrying the annotation
        doc_id: String,
        /// What is wrong with it
        reasons: Vec<RejectionReason>,
    },

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Annotation patch rejected by the Gatekeeper
    #[error("Update rejected: {}", join_reasons(.0))]
    Rejected(Vec<RejectionReason>),
}

impl StoreError {
    /// Whether the error is a recoverable update rejection rather than a
    /// storage failure
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::Rejected(_) | StoreError::NotFound(_))
    }
}

fn join_reasons(reasons: &[RejectionReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// JSON-file implementation of `DocumentStore`
///
/// The file holds an array of documents:
///
/// ```json
/// [
///   {"id": "1", "title": "Vacation Policy", "content": "...",
///    "inferred": {"unused_days": {"assumption": "...", "confidence": 0.35, "source": "agent_inferred"}}}
/// ]
/// ```
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    documents: Vec<Document>,
    gatekeeper: Gatekeeper,
}

impl JsonStore {
    /// Create an empty, unloaded store bound to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            documents: Vec::new(),
            gatekeeper: Gatekeeper::default_config(),
        }
    }

    /// Create a store bound to `path` and load it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Use a specific Gatekeeper for patch validation
    pub fn with_gatekeeper(mut self, gatekeeper: Gatekeeper) -> Self {
        self.gatekeeper = gatekeeper;
        self
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a document or a `NotFound` error
    pub fn require(&self, id: &str) -> Result<&Document, StoreError> {
        self.get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Documents that currently carry at least one annotation
    pub fn annotated(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| d.is_annotated())
    }

    /// Write the current collection to another file, leaving the store's
    /// own file untouched
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        self.write_to(path)?;
        info!("Exported {} documents to {}", self.documents.len(), path.display());
        Ok(())
    }

    /// Serialize and atomically write the collection to `path`
    fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let mut data = serde_json::to_vec_pretty(&self.documents).map_err(|e| StoreError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        data.push(b'\n');

        atomic::write_atomic(path, &data).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check ids and persisted annotations of a freshly parsed collection
    fn check_collection(&self, documents: &[Document]) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for doc in documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(StoreError::DuplicateId(doc.id.clone()));
            }

            for (key, annotation) in doc.inferred.iter().flatten() {
                let reasons = self.gatekeeper.check_persisted(key, annotation);
                if !reasons.is_empty() {
                    return Err(StoreError::InvalidAnnotation {
                        doc_id: doc.id.clone(),
                        reasons,
                    });
                }
            }
        }
        Ok(())
    }
}

impl DocumentStore for JsonStore {
    type Error = StoreError;

    fn load(&mut self) -> Result<(), Self::Error> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing(self.path.clone())
            } else {
                StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        let documents: Vec<Document> = serde_json::from_str(&raw).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })?;

        self.check_collection(&documents)?;

        debug!("Loaded {} documents from {}", documents.len(), self.path.display());
        self.documents = documents;
        Ok(())
    }

    fn save(&self) -> Result<(), Self::Error> {
        self.write_to(&self.path)?;
        debug!("Saved {} documents to {}", self.documents.len(), self.path.display());
        Ok(())
    }

    fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    fn documents(&self) -> &[Document] {
        &self.documents
    }

    fn update(&mut self, id: &str, patch: &Map<String, Value>) -> Result<(), Self::Error> {
        let idx = self
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let validation = self.gatekeeper.validate(patch);
        if validation.status == ValidationStatus::Rejected {
            warn!("Rejected patch for {}: {:?}", id, validation.reasons);
            return Err(StoreError::Rejected(validation.reasons));
        }
        let annotations = validation.annotations;
        let keys: Vec<String> = annotations.keys().cloned().collect();

        let previous = self.documents[idx].inferred.clone();
        self.documents[idx].merge_inferred(annotations);

        if let Err(e) = self.save() {
            warn!("Persisting update to {} failed, rolling back: {}", id, e);
            self.documents[idx].inferred = previous;
            return Err(e);
        }

        info!("Updated document {} with inferred facts {:?}", id, keys);
        Ok(())
    }
}
