use super::errors::ModelError;
use crate::tools::{Arguments, ToolDeclaration};
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Correlation id, unique within one model turn.
    pub id: String,
    /// Name of the function to invoke.
    pub name: String,
    /// Arguments keyed by parameter name.
    pub arguments: Arguments,
}

impl CallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a function execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    /// The handler returned a value; kept exactly as returned.
    Success { payload: Value },
    /// The call could not be completed.
    Failure { message: String },
}

impl CallOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// The result of one [`CallRequest`], paired with its id and name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub id: String,
    pub name: String,
    pub outcome: CallOutcome,
}

impl CallResult {
    /// Create a successful result for a request.
    pub fn success(request: &CallRequest, payload: Value) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: CallOutcome::Success { payload },
        }
    }

    /// Create a failed result for a request.
    pub fn failure(request: &CallRequest, message: impl Into<String>) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: CallOutcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            CallOutcome::Success { payload } => Some(payload),
            CallOutcome::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            CallOutcome::Success { .. } => None,
            CallOutcome::Failure { message } => Some(message),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Everything needed for a model request.
///
/// An empty `tools` slice means no declarations are attached and the model
/// is expected to answer in text.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub transcript: &'a Transcript,
    pub tools: &'a [ToolDeclaration],
}

/// The response from a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Concatenated text parts, if any were non-empty.
    pub text: Option<String>,
    /// Function calls, in the order the model emitted them.
    pub calls: Vec<CallRequest>,
    pub usage: Usage,
}

impl ModelResponse {
    /// A text-only response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// A response requesting function calls.
    pub fn calls(calls: Vec<CallRequest>) -> Self {
        Self {
            calls,
            ..Default::default()
        }
    }
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

/// Join text fragments, dropping the result when it is blank.
pub(crate) fn collect_text<I>(fragments: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let text = fragments.into_iter().collect::<Vec<_>>().join("");
    if text.trim().is_empty() { None } else { Some(text) }
}
