//! Two-phase tool-call orchestration.
//!
//! A query moves through a fixed set of states:
//!
//! ```text
//! AwaitingModel1 ──text──────────────────────────────────────────▶ Done
//!       │
//!       └─calls─▶ AwaitingExecution ─results─▶ AwaitingModel2 ─text─▶ Done
//! ```
//!
//! The first model call carries every registered declaration. If the model
//! asks for functions, all of them run (one failure never stops the
//! others), their results are appended as a single tool turn, and a second
//! model call without tools produces the final answer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::model::{Backend, CallOutcome, CallResult, ModelError, ModelRequest, ModelResponse};
use crate::tools::{DEFAULT_TOOL_TIMEOUT, Executor, ToolDeclaration, ToolRegistry};
use crate::transcript::Transcript;
use crate::{Error, Result};

/// Default timeout for a single model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Orchestrator settings, injected at construction.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound for each model call.
    pub model_timeout: Duration,
    /// Upper bound for each tool handler.
    pub tool_timeout: Duration,
    /// Run the calls of one model turn concurrently.
    pub parallel_tools: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            parallel_tools: true,
        }
    }
}

/// States of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingModel1,
    AwaitingExecution,
    AwaitingModel2,
    Done,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingModel1 => "awaiting_model_1",
            Self::AwaitingExecution => "awaiting_execution",
            Self::AwaitingModel2 => "awaiting_model_2",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// The answer to one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Final natural-language reply.
    pub reply: String,
    /// The designated call outcome: the first success by request order, or
    /// the first failure when every call failed. `None` when no function ran.
    pub highlight: Option<CallOutcome>,
    /// Everything exchanged while answering.
    pub transcript: Transcript,
}

impl Answer {
    /// Payload of the highlighted call, if it succeeded.
    pub fn data(&self) -> Option<&Value> {
        match &self.highlight {
            Some(CallOutcome::Success { payload }) => Some(payload),
            _ => None,
        }
    }

    /// Error message of the highlighted call, if every call failed.
    pub fn error(&self) -> Option<&str> {
        match &self.highlight {
            Some(CallOutcome::Failure { message }) => Some(message),
            _ => None,
        }
    }

    /// All call results, in request order.
    pub fn results(&self) -> impl Iterator<Item = &CallResult> {
        self.transcript.results()
    }

    /// The `{reply, data, error}` view handed to callers.
    pub fn to_reply(&self) -> Reply {
        Reply {
            reply: self.reply.clone(),
            data: self.data().cloned(),
            error: self.error().map(str::to_string),
        }
    }
}

/// Serializable summary of an [`Answer`].
///
/// Always carries all three keys; absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub reply: String,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Drives a query through the model and the registered tools.
///
/// Holds no per-request state, so one instance can serve concurrent queries.
pub struct Orchestrator<B> {
    backend: B,
    executor: Executor,
    model_timeout: Duration,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(backend: B, registry: Arc<ToolRegistry>, config: OrchestratorConfig) -> Self {
        let executor = Executor::new(registry)
            .with_timeout(config.tool_timeout)
            .with_parallel(config.parallel_tools);

        Self {
            backend,
            executor,
            model_timeout: config.model_timeout,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Answer a user query.
    ///
    /// Fails only on empty input, model communication errors, and protocol
    /// violations by the model. Tool failures end up in the transcript.
    pub async fn handle_query(&self, user_text: &str) -> Result<Answer> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }

        tracing::info!(query_len = user_text.len(), "handling query");
        let mut transcript = Transcript::new(user_text);

        let mut state = State::AwaitingModel1;
        let first = self
            .generate(state, &transcript, self.registry().declarations())
            .await?;

        if first.calls.is_empty() {
            let Some(reply) = first.text else {
                return Err(Error::Protocol(
                    "model returned neither text nor function calls".into(),
                ));
            };
            transcript.push_model_text(reply.clone());
            tracing::info!(state = %State::Done, "answered without tools");
            return Ok(Answer {
                reply,
                highlight: None,
                transcript,
            });
        }

        if first.text.is_some() {
            tracing::debug!("dropping text that accompanied function calls");
        }
        let calls = first.calls;
        transcript.push_model_calls(calls.clone())?;

        state = State::AwaitingExecution;
        tracing::debug!(%state, calls = calls.len(), "executing function calls");
        let results = self.executor.execute_all(&calls).await;
        let highlight = highlight(&results);
        transcript.push_tool_results(results)?;

        state = State::AwaitingModel2;
        let second = self.generate(state, &transcript, &[]).await?;
        let reply = match (second.text, second.calls.is_empty()) {
            (Some(text), true) => text,
            (Some(text), false) => {
                tracing::warn!(
                    calls = second.calls.len(),
                    "model requested functions in its final turn; using its text"
                );
                text
            }
            (None, false) => {
                return Err(Error::Protocol(
                    "model requested further function calls in its final turn".into(),
                ));
            }
            (None, true) => {
                return Err(Error::Protocol("model returned an empty final reply".into()));
            }
        };
        transcript.push_model_text(reply.clone());

        tracing::info!(state = %State::Done, turns = transcript.len(), "answered with tools");
        Ok(Answer {
            reply,
            highlight,
            transcript,
        })
    }

    async fn generate(
        &self,
        state: State,
        transcript: &Transcript,
        tools: &[ToolDeclaration],
    ) -> Result<ModelResponse> {
        tracing::debug!(%state, turns = transcript.len(), tools = tools.len(), "calling model");
        let request = ModelRequest { transcript, tools };

        let response = tokio::time::timeout(self.model_timeout, self.backend.call(request))
            .await
            .map_err(|_| ModelError::Timeout(self.model_timeout))??;

        tracing::debug!(
            %state,
            calls = response.calls.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "model responded"
        );
        Ok(response)
    }
}

/// Pick the outcome exposed as the answer's structured data.
fn highlight(results: &[CallResult]) -> Option<CallOutcome> {
    results
        .iter()
        .find(|r| !r.outcome.is_failure())
        .or_else(|| results.first())
        .map(|r| r.outcome.clone())
}
