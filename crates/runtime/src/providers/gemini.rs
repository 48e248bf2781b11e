//! Google Gemini `generateContent` backend.
//!
//! Differences from the Anthropic adapter:
//! - roles are `user` and `model`; tool results travel as `functionResponse`
//!   parts in a `user` turn;
//! - declarations go under `tools[].functionDeclarations`;
//! - the system prompt is a top-level `systemInstruction`;
//! - function calls usually carry no id, so one is generated per call.

use crate::model::types::collect_text;
use crate::model::{
    Backend, CallOutcome, CallRequest, ModelError, ModelRequest, ModelResponse, Usage,
};
use crate::tools::ToolDeclaration;
use crate::transcript::{ModelTurn, Turn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::arguments_from;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTools>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTools {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    max_tokens: u32,
    system: Option<String>,
    base_url: String,
}

impl GeminiBackendBuilder {
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

    pub fn build(self) -> GeminiBackend {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        GeminiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            system: self.system,
            endpoint,
        }
    }
}

/// Gemini API backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    system: Option<String>,
    endpoint: String,
}

impl GeminiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key, model)
    }

    fn text_part(text: &str) -> ApiPart {
        ApiPart {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn turn_to_api(turn: &Turn) -> ApiContent {
        let (role, parts) = match turn {
            Turn::User { text } => ("user", vec![Self::text_part(text)]),
            Turn::Model(ModelTurn::Text(text)) => ("model", vec![Self::text_part(text)]),
            Turn::Model(ModelTurn::Calls(calls)) => (
                "model",
                calls
                    .iter()
                    .map(|call| ApiPart {
                        function_call: Some(ApiFunctionCall {
                            id: None,
                            name: call.name.clone(),
                            args: Value::Object(call.arguments.clone()),
                        }),
                        ..Default::default()
                    })
                    .collect(),
            ),
            Turn::Tool { results } => (
                "user",
                results
                    .iter()
                    .map(|result| {
                        let response = match &result.outcome {
                            CallOutcome::Success { payload } => json!({ "result": payload }),
                            CallOutcome::Failure { message } => json!({ "error": message }),
                        };
                        ApiPart {
                            function_response: Some(ApiFunctionResponse {
                                name: result.name.clone(),
                                response,
                            }),
                            ..Default::default()
                        }
                    })
                    .collect(),
            ),
        };

        ApiContent {
            role: Some(role.to_string()),
            parts,
        }
    }

    fn tools_to_api(decls: &[ToolDeclaration]) -> Vec<ApiTools> {
        if decls.is_empty() {
            return Vec::new();
        }

        let function_declarations = decls
            .iter()
            .map(|decl| ApiFunctionDeclaration {
                name: decl.name.clone(),
                description: decl.description.clone(),
                // Gemini rejects object schemas with no properties.
                parameters: (!decl.parameters.is_empty()).then(|| decl.json_schema()),
            })
            .collect();

        vec![ApiTools {
            function_declarations,
        }]
    }

    fn response_from_api(api: ApiResponse) -> Result<ModelResponse, ModelError> {
        let candidate = api
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no candidates in response".into()))?;

        let mut texts = Vec::new();
        let mut calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                let id = call.id.unwrap_or_else(|| Uuid::new_v4().to_string());
                calls.push(CallRequest::new(id, call.name, arguments_from(call.args)?));
            }
        }

        Ok(ModelResponse {
            text: collect_text(texts),
            calls,
            usage: Usage {
                input_tokens: api.usage_metadata.prompt_token_count,
                output_tokens: api.usage_metadata.candidates_token_count,
            },
        })
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = ApiRequest {
            contents: request
                .transcript
                .turns()
                .iter()
                .map(Self::turn_to_api)
                .collect(),
            tools: Self::tools_to_api(request.tools),
            system_instruction: self.system.as_deref().map(|s| ApiContent {
                role: None,
                parts: vec![Self::text_part(s)],
            }),
            generation_config: ApiGenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
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

    #[test]
    fn tool_turn_maps_to_function_responses() {
        let ok = CallRequest::new("a", "get_popular_movies", Arguments::new());
        let bad = CallRequest::new("b", "get_movie_details", Arguments::new());
        let turn = Turn::Tool {
            results: vec![
                CallResult::success(&ok, json!([{"title": "Heat"}])),
                CallResult::failure(&bad, "unknown movie"),
            ],
        };

        let value = serde_json::to_value(GeminiBackend::turn_to_api(&turn)).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "parts": [
                    {"functionResponse": {"name": "get_popular_movies", "response": {"result": [{"title": "Heat"}]}}},
                    {"functionResponse": {"name": "get_movie_details", "response": {"error": "unknown movie"}}},
                ],
            })
        );
    }

    #[test]
    fn parameterless_declaration_omits_schema() {
        let decls = vec![
            ToolDeclaration::new("get_trending", "Trending today"),
            ToolDeclaration::new("search_movies", "Search")
                .required("query", ParamType::String, "Title"),
        ];
        let value = serde_json::to_value(GeminiBackend::tools_to_api(&decls)).unwrap();
        let functions = &value[0]["functionDeclarations"];
        assert!(functions[0].get("parameters").is_none());
        assert_eq!(functions[1]["parameters"]["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn function_calls_get_generated_ids() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"generationConfig": {"maxOutputTokens": 1024}})),
                Matcher::Regex(r#""functionDeclarations":\[\{"name":"get_popular_movies""#.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [
                                {"functionCall": {"name": "get_popular_movies", "args": {"genre": "Action"}}},
                                {"functionCall": {"name": "search_movies", "args": {"query": "Heat"}}}
                            ]
                        },
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 10}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = GeminiBackend::builder("test-key", "gemini-1.5-flash")
            .base_url(server.url())
            .build();
        let transcript = Transcript::new("what's popular in action");
        let tools = vec![
            ToolDeclaration::new("get_popular_movies", "Popular")
                .optional("genre", ParamType::String, "Genre"),
        ];

        let response = backend
            .call(ModelRequest {
                transcript: &transcript,
                tools: &tools,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, None);
        assert_eq!(response.calls.len(), 2);
        assert_eq!(response.calls[0].name, "get_popular_movies");
        assert_eq!(response.calls[0].arguments["genre"], "Action");
        assert_ne!(response.calls[0].id, response.calls[1].id);
        assert_eq!(response.usage.input_tokens, 30);
    }

    #[tokio::test]
    async fn final_request_pairs_calls_with_responses() {
        let call = CallRequest::new(
            "a",
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
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_body(Matcher::Json(json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "what's popular in action"}]},
                    {
                        "role": "model",
                        "parts": [{"functionCall": {"name": "get_popular_movies", "args": {"genre": "Action"}}}]
                    },
                    {
                        "role": "user",
                        "parts": [{"functionResponse": {
                            "name": "get_popular_movies",
                            "response": {"result": [{"title": "Heat"}]}
                        }}]
                    },
                ],
                "generationConfig": {"maxOutputTokens": 1024},
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "Heat is popular."}]}
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = GeminiBackend::builder("k", "gemini-1.5-flash")
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
        assert!(response.calls.is_empty());
    }

    #[tokio::test]
    async fn missing_candidates_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
            .create_async()
            .await;

        let backend = GeminiBackend::builder("k", "gemini-1.5-flash")
            .base_url(server.url())
            .build();
        let transcript = Transcript::new("hi");

        let err = backend
            .call(ModelRequest {
                transcript: &transcript,
                tools: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }
}
