//! Error types for the repair loop

use thiserror::Error;

/// Fatal errors that abort an `answer` call.
///
/// Rejected patches, bad tool arguments and protocol violations are not
/// errors; they are reported through tool results and
/// [`crate::Termination`].
#[derive(Error, Debug)]
pub enum AgentError {
    /// The document store could not be loaded
    #[error("Store error: {0}")]
    Store(String),

    /// The chat model call failed
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
