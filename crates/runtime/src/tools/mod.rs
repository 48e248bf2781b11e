//! Tool declarations, registry and execution.

pub mod errors;
mod executor;
mod handler;
mod registry;
pub mod types;

pub use errors::ToolError;
pub use executor::{DEFAULT_TOOL_TIMEOUT, Executor, validate_arguments};
pub use handler::{FnHandler, ToolHandler, handler_fn};
pub use registry::{RegisteredTool, ToolRegistry};
pub use types::{Arguments, ParamType, Parameter, ToolDeclaration};
