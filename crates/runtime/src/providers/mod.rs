//! LLM provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod anthropic;
mod gemini;

pub use anthropic::{AnthropicBackend, AnthropicBackendBuilder};
pub use gemini::{GeminiBackend, GeminiBackendBuilder};

use crate::model::{Backend, ModelError, ModelRequest, ModelResponse};
use crate::tools::Arguments;
use serde_json::Value;

/// A backend chosen at runtime from configuration.
pub enum Provider {
    Anthropic(AnthropicBackend),
    Gemini(GeminiBackend),
}

impl From<AnthropicBackend> for Provider {
    fn from(backend: AnthropicBackend) -> Self {
        Self::Anthropic(backend)
    }
}

impl From<GeminiBackend> for Provider {
    fn from(backend: GeminiBackend) -> Self {
        Self::Gemini(backend)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic(backend) => write!(f, "{backend}"),
            Self::Gemini(backend) => write!(f, "{backend}"),
        }
    }
}

impl Backend for Provider {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        match self {
            Self::Anthropic(backend) => backend.call(request).await,
            Self::Gemini(backend) => backend.call(request).await,
        }
    }
}

/// Validate the arguments of a provider function call.
///
/// Providers send either an object or nothing; anything else is malformed.
pub(crate) fn arguments_from(input: Value) -> Result<Arguments, ModelError> {
    match input {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Arguments::new()),
        other => Err(ModelError::InvalidResponse(format!(
            "function arguments must be an object, got {other}"
        ))),
    }
}

/// Render a tool payload as text for providers that expect strings.
pub(crate) fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_must_be_objects() {
        assert_eq!(arguments_from(Value::Null).unwrap().len(), 0);
        assert_eq!(arguments_from(json!({"genre": "Action"})).unwrap()["genre"], "Action");
        assert!(matches!(
            arguments_from(json!(["Action"])),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn payload_text_keeps_plain_strings() {
        assert_eq!(payload_text(&json!("No movies found")), "No movies found");
        assert_eq!(payload_text(&json!({"id": 1})), r#"{"id":1}"#);
    }

    #[test]
    fn provider_display_delegates() {
        let provider = Provider::from(GeminiBackend::builder("k", "gemini-1.5-flash").build());
        assert_eq!(provider.to_string(), "gemini(gemini-1.5-flash)");
    }
}
