//! Annotation patch validation logic

use crate::{GatekeeperError, ValidationConfig};
use mender_domain::{Annotation, InferredMap, AGENT_INFERRED_SOURCE};
use serde_json::{Map, Value};
use std::fmt;

/// Result of patch validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the patch passed validation
    pub status: ValidationStatus,

    /// Rejection reasons (if any)
    pub reasons: Vec<RejectionReason>,

    /// Parsed annotations, populated only when accepted
    pub annotations: InferredMap,
}

/// Validation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Patch accepted
    Accepted,

    /// Patch rejected
    Rejected,
}

/// Reasons for rejection
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// The patch has no keys
    EmptyPatch,

    /// The patch has more keys than allowed
    TooManyKeys {
        /// Keys in the patch
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// Fact key is empty or contains unsupported characters
    InvalidFactKey(String),

    /// Candidate is not a JSON object
    NotAnObject(String),

    /// A required field is absent
    MissingField {
        /// Fact key
        key: String,
        /// Missing field name
        field: &'static str,
    },

    /// A required field has the wrong JSON type
    InvalidFieldType {
        /// Fact key
        key: String,
        /// Field name
        field: &'static str,
        /// Expected JSON type
        expected: &'static str,
    },

    /// Confidence outside (0, 1]
    ConfidenceOutOfRange {
        /// Fact key
        key: String,
        /// Supplied confidence
        confidence: f64,
    },

    /// Confidence above the configured ceiling for inferred facts
    ConfidenceAboveCeiling {
        /// Fact key
        key: String,
        /// Supplied confidence
        confidence: f64,
        /// Configured ceiling
        ceiling: f64,
    },

    /// Source is not the reserved agent-inferred tag
    SourceMismatch {
        /// Fact key
        key: String,
        /// Supplied source
        found: String,
    },

    /// Assumption is blank
    EmptyAssumption(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::EmptyPatch => write!(f, "patch contains no facts"),
            RejectionReason::TooManyKeys { count, max } => {
                write!(f, "patch has {} facts (max {})", count, max)
            }
            RejectionReason::InvalidFactKey(key) => write!(f, "invalid fact key '{}'", key),
            RejectionReason::NotAnObject(key) => write!(f, "'{}' is not an object", key),
            RejectionReason::MissingField { key, field } => {
                write!(f, "'{}' is missing '{}'", key, field)
            }
            RejectionReason::InvalidFieldType { key, field, expected } => {
                write!(f, "'{}.{}' must be a {}", key, field, expected)
            }
            RejectionReason::ConfidenceOutOfRange { key, confidence } => {
                write!(f, "'{}' confidence {} is outside (0, 1]", key, confidence)
            }
            RejectionReason::ConfidenceAboveCeiling { key, confidence, ceiling } => write!(
                f,
                "'{}' confidence {} exceeds the inferred-fact ceiling {}",
                key, confidence, ceiling
            ),
            RejectionReason::SourceMismatch { key, found } => write!(
                f,
                "'{}' source '{}' is not '{}'",
                key, found, AGENT_INFERRED_SOURCE
            ),
            RejectionReason::EmptyAssumption(key) => write!(f, "'{}' has an empty assumption", key),
        }
    }
}

/// The Gatekeeper validates annotation patches before storage
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    config: ValidationConfig,
}

impl Gatekeeper {
    /// Create a new Gatekeeper with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Create a Gatekeeper with default configuration
    pub fn default_config() -> Self {
        Self::new(ValidationConfig::default())
    }

    /// Create a Gatekeeper after checking the configuration
    pub fn try_new(config: ValidationConfig) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self::new(config))
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a patch (fact key → candidate annotation)
    ///
    /// Every key is checked so the caller sees all reasons at once; the
    /// parsed annotations are returned only if no key failed.
    pub fn validate(&self, patch: &Map<String, Value>) -> ValidationResult {
        let mut reasons = Vec::new();
        let mut annotations = InferredMap::new();

        if patch.is_empty() {
            reasons.push(RejectionReason::EmptyPatch);
        }
        if patch.len() > self.config.max_patch_keys {
            reasons.push(RejectionReason::TooManyKeys {
                count: patch.len(),
                max: self.config.max_patch_keys,
            });
        }

        for (key, candidate) in patch {
            match self.validate_candidate(key, candidate) {
                Ok(annotation) => {
                    annotations.insert(key.clone(), annotation);
                }
                Err(mut key_reasons) => reasons.append(&mut key_reasons),
            }
        }

        if reasons.is_empty() {
            ValidationResult {
                status: ValidationStatus::Accepted,
                reasons,
                annotations,
            }
        } else {
            ValidationResult {
                status: ValidationStatus::Rejected,
                reasons,
                annotations: InferredMap::new(),
            }
        }
    }

    /// Re-check an annotation that is already persisted.
    ///
    /// Only the structural rules apply: confidence in (0, 1] and the
    /// reserved source tag. Key format, the confidence ceiling and the
    /// assumption check are configuration and may have changed since the
    /// annotation was written.
    pub fn check_persisted(&self, key: &str, annotation: &Annotation) -> Vec<RejectionReason> {
        self.validate_values(
            key,
            &annotation.assumption,
            annotation.confidence,
            &annotation.source,
            false,
        )
    }

    /// Validate a single candidate
    fn validate_candidate(
        &self,
        key: &str,
        candidate: &Value,
    ) -> Result<Annotation, Vec<RejectionReason>> {
        let mut reasons = Vec::new();

        if let Some(reason) = self.validate_fact_key(key) {
            reasons.push(reason);
        }

        let Some(obj) = candidate.as_object() else {
            reasons.push(RejectionReason::NotAnObject(key.to_string()));
            return Err(reasons);
        };

        let assumption = required_field(obj, key, "assumption", "string", Value::as_str);
        let confidence = required_field(obj, key, "confidence", "number", Value::as_f64);
        let source = required_field(obj, key, "source", "string", Value::as_str);

        let (assumption, confidence, source) = match (assumption, confidence, source) {
            (Ok(a), Ok(c), Ok(s)) => (a, c, s),
            (a, c, s) => {
                reasons.extend(a.err());
                reasons.extend(c.err());
                reasons.extend(s.err());
                return Err(reasons);
            }
        };

        reasons.extend(self.validate_values(key, assumption, confidence, source, true));
        if !reasons.is_empty() {
            return Err(reasons);
        }

        serde_json::from_value(candidate.clone()).map_err(|_| {
            vec![RejectionReason::NotAnObject(key.to_string())]
        })
    }

    /// Validate fact key format
    fn validate_fact_key(&self, key: &str) -> Option<RejectionReason> {
        if !self.config.validate_fact_keys {
            return None;
        }
        let well_formed = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if well_formed {
            None
        } else {
            Some(RejectionReason::InvalidFactKey(key.to_string()))
        }
    }

    /// Validate assumption, confidence and source values
    fn validate_values(
        &self,
        key: &str,
        assumption: &str,
        confidence: f64,
        source: &str,
        apply_policy: bool,
    ) -> Vec<RejectionReason> {
        let mut reasons = Vec::new();

        // NaN fails both comparisons
        if !(confidence > 0.0 && confidence <= 1.0) {
            reasons.push(RejectionReason::ConfidenceOutOfRange {
                key: key.to_string(),
                confidence,
            });
        } else if apply_policy && confidence > self.config.max_confidence {
            reasons.push(RejectionReason::ConfidenceAboveCeiling {
                key: key.to_string(),
                confidence,
                ceiling: self.config.max_confidence,
            });
        }

        if source != AGENT_INFERRED_SOURCE {
            reasons.push(RejectionReason::SourceMismatch {
                key: key.to_string(),
                found: source.to_string(),
            });
        }

        if apply_policy && self.config.require_nonempty_assumption && assumption.trim().is_empty() {
            reasons.push(RejectionReason::EmptyAssumption(key.to_string()));
        }

        reasons
    }
}

/// Fetch a required field with the expected JSON type
fn required_field<'a, T>(
    obj: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
    expected: &'static str,
    extract: impl Fn(&'a Value) -> Option<T>,
) -> Result<T, RejectionReason> {
    let value = obj.get(field).ok_or_else(|| RejectionReason::MissingField {
        key: key.to_string(),
        field,
    })?;
    extract(value).ok_or_else(|| RejectionReason::InvalidFieldType {
        key: key.to_string(),
        field,
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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

    #[test]
    fn test_valid_patch() {
        let gatekeeper = Gatekeeper::default_config();
        let result = gatekeeper.validate(&patch(json!({"unused_days": unused_days()})));

        assert_eq!(result.status, ValidationStatus::Accepted);
        assert!(result.reasons.is_empty());
        let annotation = &result.annotations["unused_days"];
        assert_eq!(annotation.confidence, 0.35);
        assert_eq!(annotation.fields["status"], "expire");
    }

    #[test]
    fn test_source_mismatch() {
        let gatekeeper = Gatekeeper::default_config();
        let mut candidate = unused_days();
        candidate["source"] = json!("policy_document");

        let result = gatekeeper.validate(&patch(json!({"unused_days": candidate})));

        assert_eq!(result.status, ValidationStatus::Rejected);
        assert!(result.annotations.is_empty());
        match &result.reasons[0] {
            RejectionReason::SourceMismatch { found, .. } => assert_eq!(found, "policy_document"),
            other => panic!("Expected SourceMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_all_reported() {
        let gatekeeper = Gatekeeper::default_config();
        let result = gatekeeper.validate(&patch(json!({"duration": {"weeks": 12}})));

        assert_eq!(result.status, ValidationStatus::Rejected);
        assert_eq!(result.reasons.len(), 3);
        assert!(result.reasons.iter().all(|r| matches!(r, RejectionReason::MissingField { .. })));
    }

    #[test]
    fn test_one_bad_key_rejects_whole_patch() {
        let gatekeeper = Gatekeeper::default_config();
        let result = gatekeeper.validate(&patch(json!({
            "unused_days": unused_days(),
            "carryover": {"assumption": "none", "confidence": 0.3}
        })));

        assert_eq!(result.status, ValidationStatus::Rejected);
        assert!(result.annotations.is_empty());
        assert_eq!(
            result.reasons,
            vec![RejectionReason::MissingField {
                key: "carryover".to_string(),
                field: "source"
            }]
        );
    }

    #[test]
    fn test_confidence_bounds() {
        let gatekeeper = Gatekeeper::default_config();
        for bad in [0.0, -0.1, 1.01] {
            let mut candidate = unused_days();
            candidate["confidence"] = json!(bad);
            let result = gatekeeper.validate(&patch(json!({"unused_days": candidate})));
            assert!(matches!(
                result.reasons[0],
                RejectionReason::ConfidenceOutOfRange { .. }
            ));
        }

        let mut candidate = unused_days();
        candidate["confidence"] = json!(1.0);
        let result = gatekeeper.validate(&patch(json!({"unused_days": candidate})));
        assert_eq!(result.status, ValidationStatus::Accepted);
    }

    #[test]
    fn test_confidence_as_string_is_type_error() {
        let gatekeeper = Gatekeeper::default_config();
        let mut candidate = unused_days();
        candidate["confidence"] = json!("0.35");
        let result = gatekeeper.validate(&patch(json!({"unused_days": candidate})));
        assert_eq!(
            result.reasons,
            vec![RejectionReason::InvalidFieldType {
                key: "unused_days".to_string(),
                field: "confidence",
                expected: "number"
            }]
        );
    }

    #[test]
    fn test_strict_ceiling() {
        let gatekeeper = Gatekeeper::new(ValidationConfig::strict());
        let mut candidate = unused_days();
        candidate["confidence"] = json!(0.9);
        let result = gatekeeper.validate(&patch(json!({"unused_days": candidate})));

        match &result.reasons[0] {
            RejectionReason::ConfidenceAboveCeiling { ceiling, .. } => assert_eq!(*ceiling, 0.5),
            other => panic!("Expected ConfidenceAboveCeiling, got {:?}", other),
        }
    }

    #[test]
    fn test_not_an_object() {
        let gatekeeper = Gatekeeper::default_config();
        let result = gatekeeper.validate(&patch(json!({"unused_days": "expire"})));
        assert_eq!(
            result.reasons,
            vec![RejectionReason::NotAnObject("unused_days".to_string())]
        );
    }

    #[test]
    fn test_empty_patch_and_bad_key() {
        let gatekeeper = Gatekeeper::default_config();
        let result = gatekeeper.validate(&Map::new());
        assert_eq!(result.reasons, vec![RejectionReason::EmptyPatch]);

        let result = gatekeeper.validate(&patch(json!({"unused days": unused_days()})));
        assert!(matches!(result.reasons[0], RejectionReason::InvalidFactKey(_)));

        let permissive = Gatekeeper::new(ValidationConfig::permissive());
        let result = permissive.validate(&patch(json!({"unused days": unused_days()})));
        assert_eq!(result.status, ValidationStatus::Accepted);
    }

    #[test]
    fn test_missing_fields_listed() {
        let gatekeeper = Gatekeeper::default_config();
        let result = gatekeeper.validate(&patch(json!({"duration": {"weeks": 12}})));
        assert_eq!(result.status, ValidationStatus::Rejected);
        assert_eq!(result.reasons.len(), 3);
        assert_eq!(result.reasons[0].to_string(), "'duration' is missing 'assumption'");
    }

    #[test]
    fn test_check_persisted_ignores_ceiling() {
        let gatekeeper = Gatekeeper::new(ValidationConfig::strict());
        let annotation = Annotation::new("Typical allowance absent policy", 0.9);
        assert!(gatekeeper.check_persisted("annual_limit", &annotation).is_empty());

        let mut foreign = annotation.clone();
        foreign.source = "hr_handbook".to_string();
        assert_eq!(gatekeeper.check_persisted("annual_limit", &foreign).len(), 1);
    }

    #[test]
    fn test_check_persisted_ignores_key_format_and_assumption_policy() {
        let gatekeeper = Gatekeeper::default_config();
        let annotation = Annotation::new("", 0.35);
        assert!(gatekeeper.check_persisted("unused days", &annotation).is_empty());

        let mut out_of_range = annotation.clone();
        out_of_range.confidence = 1.5;
        assert!(matches!(
            gatekeeper.check_persisted("unused days", &out_of_range)[..],
            [RejectionReason::ConfidenceOutOfRange { .. }]
        ));
    }

    #[test]
    fn test_try_new_rejects_bad_config() {
        let mut config = ValidationConfig::default();
        config.max_patch_keys = 0;
        assert!(matches!(
            Gatekeeper::try_new(config),
            Err(GatekeeperError::Config(_))
        ));
    }
}
