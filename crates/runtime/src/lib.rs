//! Marquee runtime: tool-call orchestration between a language model and
//! registered functions.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **ToolRegistry**: the declared functions and the handlers bound to them.
//! - **Executor**: runs the model's call requests, turning every tool-side
//!   failure into a failed call result instead of an error.
//! - **Transcript**: the append-only record of one request's turns.
//! - **Orchestrator**: the two-phase loop (model, tools, model) behind
//!   [`Orchestrator::handle_query`].
//! - **Backend**: a trait abstracting LLM providers (Anthropic, Gemini).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use runtime::{GeminiBackend, Orchestrator, OrchestratorConfig, ToolRegistry};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = GeminiBackend::builder("AIza...", "gemini-1.5-flash").build();
//! let registry = Arc::new(ToolRegistry::new());
//!
//! let orchestrator = Orchestrator::new(backend, registry, OrchestratorConfig::default());
//! let answer = orchestrator.handle_query("Who directed Heat?").await?;
//! println!("{}", answer.reply);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
mod orchestrator;
pub mod providers;
pub mod tools;
pub mod transcript;

// Error types
pub use error::{Error, Result};

// Model protocol types
pub use model::{
    Backend, CallOutcome, CallRequest, CallResult, ModelError, ModelRequest, ModelResponse, Usage,
};

// Provider adapters
pub use providers::{AnthropicBackend, GeminiBackend, Provider};

// Tools
pub use tools::{
    Arguments, Executor, ParamType, ToolDeclaration, ToolError, ToolHandler, ToolRegistry,
    handler_fn,
};

// Transcript
pub use transcript::{ModelTurn, Role, Transcript, Turn};

// Orchestration
pub use orchestrator::{Answer, Orchestrator, OrchestratorConfig, Reply};
