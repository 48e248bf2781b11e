//! Registry of callable tools.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ToolDeclaration, ToolError, ToolHandler};

/// A registered tool: its declaration and the handler bound to it.
#[derive(Clone)]
pub struct RegisteredTool<'a> {
    pub declaration: &'a ToolDeclaration,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for RegisteredTool<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("declaration", self.declaration)
            .finish_non_exhaustive()
    }
}

/// Declares the available functions and maps their names to handlers.
///
/// Populated once at startup, then shared read-only (behind an `Arc`)
/// between requests.
#[derive(Default)]
pub struct ToolRegistry {
    declarations: Vec<ToolDeclaration>,
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration with its handler.
    pub fn register(
        &mut self,
        declaration: ToolDeclaration,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), ToolError> {
        self.register_shared(declaration, Arc::new(handler))
    }

    /// Register a handler that is already shared.
    pub fn register_shared(
        &mut self,
        declaration: ToolDeclaration,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        if self.index.contains_key(&declaration.name) {
            return Err(ToolError::DuplicateName(declaration.name));
        }

        tracing::debug!(tool = %declaration.name, "registered tool");
        self.index
            .insert(declaration.name.clone(), self.declarations.len());
        self.declarations.push(declaration);
        self.handlers.push(handler);
        Ok(())
    }

    /// Get a tool by name.
    pub fn lookup(&self, name: &str) -> Result<RegisteredTool<'_>, ToolError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        Ok(RegisteredTool {
            declaration: &self.declarations[idx],
            handler: Arc::clone(&self.handlers[idx]),
        })
    }

    /// All declarations, in registration order.
    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("declarations", &self.declarations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Arguments, ParamType, handler_fn};
    use serde_json::{Value, json};

    fn echo() -> impl ToolHandler {
        handler_fn(|args: Arguments| async move { Ok(Value::Object(args)) })
    }

    #[test]
    fn empty_registry_has_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.declarations().is_empty());
    }

    #[test]
    fn declarations_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["search_movies", "get_popular_movies", "get_movie_details"] {
            registry
                .register(ToolDeclaration::new(name, "test"), echo())
                .unwrap();
        }

        let names: Vec<_> = registry
            .declarations()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["search_movies", "get_popular_movies", "get_movie_details"]
        );
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDeclaration::new("search_movies", "first"), echo())
            .unwrap();

        let err = registry
            .register(ToolDeclaration::new("search_movies", "second"), echo())
            .unwrap_err();
        assert_eq!(err, ToolError::DuplicateName("search_movies".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.declarations()[0].description, "first");
    }

    #[test]
    fn unknown_lookup_fails() {
        let registry = ToolRegistry::new();
        let err = registry.lookup("get_weather").unwrap_err();
        assert_eq!(err.to_string(), "unknown function get_weather");
    }

    #[tokio::test]
    async fn lookup_returns_bound_handler() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDeclaration::new("echo", "Echo arguments")
                    .required("text", ParamType::String, "Text"),
                echo(),
            )
            .unwrap();

        let tool = registry.lookup("echo").unwrap();
        assert_eq!(tool.declaration.parameters.len(), 1);

        let mut args = Arguments::new();
        args.insert("text".into(), json!("hi"));
        let output = tool.handler.call(args).await.unwrap();
        assert_eq!(output, json!({"text": "hi"}));
    }
}
