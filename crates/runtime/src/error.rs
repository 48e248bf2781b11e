use thiserror::Error;

use crate::model::ModelError;
use crate::transcript::TranscriptError;

/// Request-level failures.
///
/// Tool-side problems never appear here; they are folded into the
/// transcript as failed call results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller's input was rejected before orchestration started.
    #[error("invalid query: {0}")]
    Validation(String),

    /// A model call failed or timed out.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// The model broke the request/response contract.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<TranscriptError> for Error {
    fn from(err: TranscriptError) -> Self {
        Self::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
