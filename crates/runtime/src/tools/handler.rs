//! Tool handler trait.

use super::{Arguments, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// Trait for functions the model can invoke.
///
/// Handlers receive arguments that already passed the declaration's
/// required-parameter and type checks. This is the boundary between the
/// model loop and side effects.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Arguments) -> Result<Value, ToolError>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as a handler.
///
/// ```ignore
/// let handler = handler_fn(|args| async move { Ok(Value::Object(args)) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: Arguments) -> Result<Value, ToolError> {
        (self.0)(arguments).await
    }
}
