//! Function executor.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;

use super::{Arguments, ToolDeclaration, ToolError, ToolRegistry};
use crate::model::{CallRequest, CallResult};

/// Default timeout for a single handler invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs call requests against a [`ToolRegistry`].
///
/// Every failure (unknown function, bad arguments, handler error, panic or
/// timeout) comes back as a failed [`CallResult`] rather than an `Err`.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    parallel: bool,
}

impl Executor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
            parallel: true,
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the calls of one turn concurrently (default) or one by one.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a single call request.
    pub async fn execute(&self, request: &CallRequest) -> CallResult {
        match self.try_execute(request).await {
            Ok(payload) => {
                tracing::debug!(tool = %request.name, id = %request.id, "tool call succeeded");
                CallResult::success(request, payload)
            }
            Err(err) => {
                tracing::warn!(tool = %request.name, id = %request.id, error = %err, "tool call failed");
                CallResult::failure(request, err.to_string())
            }
        }
    }

    /// Execute every request, returning results in request order.
    pub async fn execute_all(&self, requests: &[CallRequest]) -> Vec<CallResult> {
        if self.parallel {
            return join_all(requests.iter().map(|request| self.execute(request))).await;
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute(request).await);
        }
        results
    }

    async fn try_execute(&self, request: &CallRequest) -> Result<Value, ToolError> {
        let tool = self.registry.lookup(&request.name)?;
        validate_arguments(tool.declaration, &request.arguments)?;

        let call = AssertUnwindSafe(tool.handler.call(request.arguments.clone())).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ToolError::Panicked {
                tool: request.name.clone(),
                message: panic_message(panic.as_ref()),
            }),
            Err(_) => Err(ToolError::Timeout {
                tool: request.name.clone(),
                millis: saturating_millis(self.timeout),
            }),
        }
    }
}

/// Check the arguments against the declaration's parameter schema.
///
/// `null` counts as absent. Arguments the declaration does not name are
/// passed through untouched.
pub fn validate_arguments(
    declaration: &ToolDeclaration,
    arguments: &Arguments,
) -> Result<(), ToolError> {
    for param in &declaration.parameters {
        match arguments.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(ToolError::MissingParameter {
                        tool: declaration.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
            }
            Some(value) if !param.kind.accepts(value) => {
                return Err(ToolError::InvalidParameter {
                    tool: declaration.name.clone(),
                    parameter: param.name.clone(),
                    reason: format!("expected {}, got {value}", param.kind.as_str()),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
