//! Shared HTTP plumbing for the chat providers

use crate::LlmError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for model requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per model call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Build a client with the default request timeout
pub(crate) fn client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| LlmError::Communication(format!("Failed to build HTTP client: {}", e)))
}

/// Build the runtime a provider blocks on to expose the sync `ChatModel` trait
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, LlmError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| LlmError::Other(format!("Failed to start runtime: {}", e)))
}

/// Send a request, retrying with exponential backoff (1s, 2s, 4s, ...).
///
/// `404` means the model is not served and is not retried. A response that
/// does not parse as `R` is not retried either.
pub(crate) async fn send_with_retry<R, F>(
    model: &str,
    max_retries: u32,
    mut request: F,
) -> Result<R, LlmError>
where
    R: DeserializeOwned,
    F: FnMut() -> reqwest::RequestBuilder,
{
    let max_retries = max_retries.max(1);
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < max_retries {
        match request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<R>().await.map_err(|e| {
                        LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                    });
                } else if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(LlmError::ModelNotAvailable(model.to_string()));
                } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(LlmError::RateLimitExceeded);
                } else {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    last_error = Some(LlmError::Communication(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }
            }
            Err(e) => {
                last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
            }
        }

        attempts += 1;
        if attempts < max_retries {
            let delay = Duration::from_secs(2u64.pow(attempts - 1));
            if let Some(e) = &last_error {
                warn!("Model call attempt {} failed ({}), retrying in {:?}", attempts, e, delay);
            }
            tokio::time::sleep(delay).await;
        }
    }

    debug!("Giving up on model {} after {} attempts", model, attempts);
    Err(last_error.unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
}
