//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A query could not be answered.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// The movie tools could not be set up.
    #[error(transparent)]
    Tmdb(#[from] tmdb::Error),

    /// Tool registration failed.
    #[error(transparent)]
    Tool(#[from] runtime::ToolError),

    /// Output could not be encoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
