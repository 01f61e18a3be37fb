//! Mender Gatekeeper
//!
//! Validates annotation patches before they reach the document store.
//!
//! The Gatekeeper checks, for every fact key of a patch:
//! - the candidate is a JSON object carrying `assumption`, `confidence` and `source`
//! - `confidence` lies in (0, 1] and under the configured ceiling
//! - `source` is the reserved agent-inferred tag
//! - the fact key itself is well formed
//!
//! A patch is all-or-nothing: one bad key rejects the whole patch.
//!
//! # Examples
//!
//! ```
//! use mender_gatekeeper::{Gatekeeper, ValidationStatus};
//! use serde_json::json;
//!
//! let gatekeeper = Gatekeeper::default_config();
//! let patch = json!({
//!     "unused_days": {
//!         "status": "expire",
//!         "assumption": "Expiration at end of calendar year unless specified",
//!         "confidence": 0.35,
//!         "source": "agent_inferred"
//!     }
//! });
//!
//! let result = gatekeeper.validate(patch.as_object().unwrap());
//! assert_eq!(result.status, ValidationStatus::Accepted);
//! ```

#![warn(missing_docs)]

mod validator;
mod error;
mod config;

pub use validator::{Gatekeeper, ValidationResult, ValidationStatus, RejectionReason};
pub use error::GatekeeperError;
pub use config::ValidationConfig;
