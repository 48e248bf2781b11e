use thiserror::Error;

/// Errors that can occur while registering or executing tools.
///
/// Execution errors never abort a request; the executor folds them into a
/// failed [`CallResult`](crate::CallResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("function {0} is already registered")]
    DuplicateName(String),
    #[error("unknown function {0}")]
    UnknownTool(String),
    #[error("missing required parameter `{parameter}` for function {tool}")]
    MissingParameter { tool: String, parameter: String },
    #[error("invalid parameter `{parameter}` for function {tool}: {reason}")]
    InvalidParameter {
        tool: String,
        parameter: String,
        reason: String,
    },
    #[error("function {tool} timed out after {millis}ms")]
    Timeout { tool: String, millis: u64 },
    #[error("function {tool} panicked: {message}")]
    Panicked { tool: String, message: String },
    #[error("execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    /// Wrap any displayable failure from a handler.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}
