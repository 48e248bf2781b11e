//! TMDB movie data and the functions the chatbot model can call on it.
//!
//! ```ignore
//! use std::sync::Arc;
//! use runtime::ToolRegistry;
//! use tmdb::{TmdbClient, TmdbConfig, register_movie_tools};
//!
//! let client = Arc::new(TmdbClient::new(TmdbConfig::new("tmdb-key"))?);
//! let mut registry = ToolRegistry::new();
//! register_movie_tools(&mut registry, client)?;
//! ```

mod client;
mod error;
pub mod tools;
pub mod types;

pub use client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, TmdbClient, TmdbConfig};
pub use error::{Error, Result};
pub use tools::{movie_declarations, register_movie_tools};
pub use types::{MovieDetails, MovieSummary};
