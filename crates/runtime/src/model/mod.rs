//! LLM protocol types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, CallOutcome, CallRequest, CallResult, ModelRequest, ModelResponse, Usage,
};
