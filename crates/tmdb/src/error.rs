//! TMDB error types.

use thiserror::Error;

/// TMDB client errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request never got an HTTP response (connect, TLS, timeout).
    #[error("TMDB request failed: {0}")]
    Network(String),

    /// TMDB answered with a non-success status.
    #[error("TMDB returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("unexpected TMDB response: {0}")]
    Decode(String),

    /// The lookup matched nothing.
    #[error("{0}")]
    NotFound(String),

    /// The client could not be built from its configuration.
    #[error("invalid TMDB configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
