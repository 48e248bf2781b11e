use std::time::Duration;
use thiserror::Error;

/// Errors from LLM provider calls.
///
/// Every variant is fatal to the request that triggered it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The LLM provider returned an error response.
    #[error("provider api: {0}")]
    Api(String),

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider did not answer in time.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}
