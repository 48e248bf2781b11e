//! Anthropic Messages API backend.

use crate::model::types::collect_text;
use crate::model::{
    Backend, CallOutcome, CallRequest, ModelError, ModelRequest, ModelResponse, Usage,
};
use crate::tools::ToolDeclaration;
use crate::transcript::{ModelTurn, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{arguments_from, payload_text};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiResponseBlock>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackendBuilder {
    api_key: String,
    model: String,
    max_tokens: u32,
    system: Option<String>,
    base_url: String,
}

impl AnthropicBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1024,
            system: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Override the API origin (tests, proxies).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> AnthropicBackend {
        AnthropicBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            system: self.system,
            endpoint: format!("{}/v1/messages", self.base_url.trim_end_matches('/')),
        }
    }
}

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    system: Option<String>,
    endpoint: String,
}

impl AnthropicBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> AnthropicBackendBuilder {
        AnthropicBackendBuilder::new(api_key, model)
    }

    fn turn_to_api(turn: &Turn) -> ApiMessage {
        match turn {
            Turn::User { text } => ApiMessage {
                role: "user",
                content: ApiContent::Text(text.clone()),
            },
            Turn::Model(ModelTurn::Text(text)) => ApiMessage {
                role: "assistant",
                content: ApiContent::Text(text.clone()),
            },
            Turn::Model(ModelTurn::Calls(calls)) => ApiMessage {
                role: "assistant",
                content: ApiContent::Blocks(
                    calls
                        .iter()
                        .map(|call| ApiContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: Value::Object(call.arguments.clone()),
                        })
                        .collect(),
                ),
            },
            Turn::Tool { results } => ApiMessage {
                role: "user",
                content: ApiContent::Blocks(
                    results
                        .iter()
                        .map(|result| {
                            let (content, is_error) = match &result.outcome {
                                CallOutcome::Success { payload } => (payload_text(payload), false),
                                CallOutcome::Failure { message } => (message.clone(), true),
                            };
                            ApiContentBlock::ToolResult {
                                tool_use_id: result.id.clone(),
                                content,
                                is_error,
                            }
                        })
                        .collect(),
                ),
            },
        }
    }

    /// Render a turn without `tool_use`/`tool_result` blocks.
    ///
    /// The Messages API rejects those blocks in a request that declares no
    /// tools, so a request without tools carries the exchange as text.
    fn turn_to_text(turn: &Turn) -> ApiMessage {
        match turn {
            Turn::Model(ModelTurn::Calls(calls)) => ApiMessage {
                role: "assistant",
                content: ApiContent::Text(
                    calls
                        .iter()
                        .map(|call| {
                            let input = Value::Object(call.arguments.clone());
                            format!("Called {} with {input}", call.name)
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
            },
            Turn::Tool { results } => ApiMessage {
                role: "user",
                content: ApiContent::Text(
                    results
                        .iter()
                        .map(|result| match &result.outcome {
                            CallOutcome::Success { payload } => {
                                format!("{} returned: {}", result.name, payload_text(payload))
                            }
                            CallOutcome::Failure { message } => {
                                format!("{} failed: {message}", result.name)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
            },
            other => Self::turn_to_api(other),
        }
    }

    fn build_request<'a>(&'a self, request: &ModelRequest<'_>) -> ApiRequest<'a> {
        let render: fn(&Turn) -> ApiMessage = if request.tools.is_empty() {
            Self::turn_to_text
        } else {
            Self::turn_to_api
        };

        ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: request.transcript.turns().iter().map(render).collect(),
            system: self.system.as_deref(),
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
        }
    }

    fn tool_to_api(decl: &ToolDeclaration) -> ApiTool {
        ApiTool {
            name: decl.name.clone(),
            description: decl.description.clone(),
            input_schema: decl.json_schema(),
        }
    }

    fn response_from_api(api: ApiResponse) -> Result<ModelResponse, ModelError> {
        let mut texts = Vec::new();
        let mut calls = Vec::new();

        for block in api.content {
            match block {
                ApiResponseBlock::Text { text } => texts.push(text),
                ApiResponseBlock::ToolUse { id, name, input } => {
                    calls.push(CallRequest::new(id, name, arguments_from(input)?));
                }
                ApiResponseBlock::Unknown => {}
            }
        }

        Ok(ModelResponse {
            text: collect_text(texts),
            calls,
            usage: Usage {
                input_tokens: api.usage.input_tokens,
                output_tokens: api.usage.output_tokens,
            },
        })
    }
}

impl std::fmt::Display for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anthropic({})", self.model)
    }
}

impl Backend for AnthropicBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = self.build_request(&request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Self::response_from_api(api_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CallResult;
    use crate::tools::{Arguments, ParamType};
    use crate::transcript::Transcript;
    use mockito::Matcher;
    use serde_json::json;

    fn declarations() -> Vec<ToolDeclaration> {
        vec![
            ToolDeclaration::new("get_popular_movies", "Currently popular movies")
                .optional("genre", ParamType::String, "Genre filter"),
        ]
    }

    #[test]
    fn display_names_model() {
        let backend = AnthropicBackend::builder("key", "claude-sonnet-4-20250514").build();
        assert_eq!(backend.to_string(), "anthropic(claude-sonnet-4-20250514)");
    }

    #[test]
    fn tool_turn_maps_to_tool_result_blocks() {
        let call = CallRequest::new("toolu_1", "get_popular_movies", Arguments::new());
        let turn = Turn::Tool {
            results: vec![CallResult::failure(&call, "TMDB returned 503")],
        };

        let value = serde_json::to_value(AnthropicBackend::turn_to_api(&turn)).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "toolu_1",
                    "content": "TMDB returned 503",
                    "is_error": true,
                }],
            })
        );
    }

    #[tokio::test]
    async fn parses_tool_use_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "model": "claude-sonnet-4-20250514",
                    "max_tokens": 1024,
                })),
                Matcher::Regex(r#""input_schema":\{"properties""#.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "content": [
                        { "type": "text", "text": "Let me check." },
                        {
                            "type": "tool_use",
                            "id": "toolu_1",
                            "name": "get_popular_movies",
                            "input": { "genre": "Action" }
                        }
                    ],
                    "usage": { "input_tokens": 12, "output_tokens": 7 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = AnthropicBackend::builder("test-key", "claude-sonnet-4-20250514")
            .base_url(server.url())
            .build();
        let transcript = Transcript::new("what's popular in action");
        let tools = declarations();

        let response = backend
            .call(ModelRequest {
                transcript: &transcript,
                tools: &tools,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text.as_deref(), Some("Let me check."));
        assert_eq!(response.calls.len(), 1);
        assert_eq!(response.calls[0].id, "toolu_1");
        assert_eq!(response.calls[0].arguments["genre"], "Action");
        assert_eq!(response.usage.output_tokens, 7);
    }

    #[tokio::test]
    async fn request_without_tools_sends_exchange_as_text() {
        let call = CallRequest::new(
            "toolu_1",
            "get_popular_movies",
            serde_json::from_value(json!({"genre": "Action"})).unwrap(),
        );
        let mut transcript = Transcript::new("what's popular in action");
        transcript.push_model_calls(vec![call.clone()]).unwrap();
        transcript
            .push_tool_results(vec![CallResult::success(&call, json!([{"title": "Heat"}]))])
            .unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::Json(json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 1024,
                "messages": [
                    {"role": "user", "content": "what's popular in action"},
                    {
                        "role": "assistant",
                        "content": "Called get_popular_movies with {\"genre\":\"Action\"}"
                    },
                    {
                        "role": "user",
                        "content": "get_popular_movies returned: [{\"title\":\"Heat\"}]"
                    },
                ],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"content": [{"type": "text", "text": "Heat is popular."}]}).to_string(),
            )
            .create_async()
            .await;

        let backend = AnthropicBackend::builder("k", "claude-sonnet-4-20250514")
            .base_url(server.url())
            .build();
        let response = backend
            .call(ModelRequest {
                transcript: &transcript,
                tools: &[],
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text.as_deref(), Some("Heat is popular."));
    }

    #[test]
    fn request_with_tools_keeps_tool_blocks() {
        let call = CallRequest::new("toolu_1", "get_popular_movies", Arguments::new());
        let mut transcript = Transcript::new("popular?");
        transcript.push_model_calls(vec![call.clone()]).unwrap();
        transcript
            .push_tool_results(vec![CallResult::failure(&call, "TMDB returned 503")])
            .unwrap();

        let backend = AnthropicBackend::builder("k", "m").build();
        let tools = declarations();
        let value = serde_json::to_value(backend.build_request(&ModelRequest {
            transcript: &transcript,
            tools: &tools,
        }))
        .unwrap();

        assert_eq!(value["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(value["messages"][2]["content"][0]["type"], "tool_result");
        assert_eq!(value["tools"][0]["name"], "get_popular_movies");
    }

    #[test]
    fn failed_results_render_as_text() {
        let call = CallRequest::new("toolu_1", "get_movie_details", Arguments::new());
        let turn = Turn::Tool {
            results: vec![CallResult::failure(&call, "unknown movie")],
        };
        let value = serde_json::to_value(AnthropicBackend::turn_to_text(&turn)).unwrap();
        assert_eq!(
            value,
            json!({"role": "user", "content": "get_movie_details failed: unknown movie"})
        );
    }

    #[tokio::test]
    async fn error_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let backend = AnthropicBackend::builder("k", "m").base_url(server.url()).build();
        let transcript = Transcript::new("hi");

        let err = backend
            .call(ModelRequest {
                transcript: &transcript,
                tools: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Api(ref msg) if msg.contains("overloaded")));
    }
}
