//! Per-request conversation transcript.
//!
//! A [`Transcript`] is the ordered, append-only record of turns exchanged
//! while answering one query. It starts with the user's turn and is dropped
//! once the query is answered; nothing carries over between requests.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::{CallRequest, CallResult};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// What the model said in a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTurn {
    /// A natural-language answer.
    Text(String),
    /// A request to run one or more functions.
    Calls(Vec<CallRequest>),
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User { text: String },
    Model(ModelTurn),
    Tool { results: Vec<CallResult> },
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Model(_) => Role::Model,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// The call requests of a model call-request turn.
    pub fn calls(&self) -> Option<&[CallRequest]> {
        match self {
            Self::Model(ModelTurn::Calls(calls)) => Some(calls),
            _ => None,
        }
    }
}

/// Violations of the transcript's ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("model turn requested no calls")]
    EmptyCallTurn,
    #[error("call id `{0}` is empty or used twice in one turn")]
    InvalidCallId(String),
    #[error("tool turn must follow a model call-request turn")]
    DanglingToolTurn,
    #[error("result `{0}` does not answer a call of the preceding turn")]
    UnexpectedResult(String),
    #[error("call `{0}` has no result")]
    MissingResult(String),
}

/// Ordered record of turns for a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with the user's turn.
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User {
                text: user_text.into(),
            }],
        }
    }

    /// Append a model text turn.
    pub fn push_model_text(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Model(ModelTurn::Text(text.into())));
    }

    /// Append a model call-request turn.
    ///
    /// Calls must be non-empty and carry unique, non-empty ids.
    pub fn push_model_calls(&mut self, calls: Vec<CallRequest>) -> Result<(), TranscriptError> {
        if calls.is_empty() {
            return Err(TranscriptError::EmptyCallTurn);
        }

        let mut seen = HashSet::new();
        for call in &calls {
            if call.id.is_empty() || !seen.insert(call.id.as_str()) {
                return Err(TranscriptError::InvalidCallId(call.id.clone()));
            }
        }

        self.turns.push(Turn::Model(ModelTurn::Calls(calls)));
        Ok(())
    }

    /// Append a tool turn answering the immediately preceding call requests.
    ///
    /// The result ids must match the request ids exactly; order may differ.
    pub fn push_tool_results(&mut self, results: Vec<CallResult>) -> Result<(), TranscriptError> {
        let calls = self
            .turns
            .last()
            .and_then(Turn::calls)
            .ok_or(TranscriptError::DanglingToolTurn)?;

        let mut pending: HashSet<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        for result in &results {
            if !pending.remove(result.id.as_str()) {
                return Err(TranscriptError::UnexpectedResult(result.id.clone()));
            }
        }
        if let Some(id) = pending.into_iter().next() {
            return Err(TranscriptError::MissingResult(id.to_string()));
        }

        self.turns.push(Turn::Tool { results });
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Roles of all turns, in order.
    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(Turn::role).collect()
    }

    /// All call results recorded so far, in order.
    pub fn results(&self) -> impl Iterator<Item = &CallResult> {
        self.turns.iter().flat_map(|turn| match turn {
            Turn::Tool { results } => results.as_slice(),
            _ => &[][..],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Arguments;
    use serde_json::json;

    fn call(id: &str, name: &str) -> CallRequest {
        CallRequest::new(id, name, Arguments::new())
    }

    #[test]
    fn starts_with_user_turn() {
        let transcript = Transcript::new("what's popular in action");
        assert_eq!(transcript.roles(), [Role::User]);
        assert_eq!(transcript.results().count(), 0);
    }

    #[test]
    fn tool_turn_requires_preceding_calls() {
        let mut transcript = Transcript::new("hi");
        let result = CallResult::success(&call("1", "search_movies"), json!([]));
        assert_eq!(
            transcript.push_tool_results(vec![result.clone()]),
            Err(TranscriptError::DanglingToolTurn)
        );

        transcript.push_model_text("hello");
        assert_eq!(
            transcript.push_tool_results(vec![result]),
            Err(TranscriptError::DanglingToolTurn)
        );
        assert_eq!(transcript.roles(), [Role::User, Role::Model]);
    }

    #[test]
    fn results_may_arrive_in_any_order() {
        let a = call("a", "search_movies");
        let b = call("b", "get_popular_movies");

        let mut transcript = Transcript::new("hi");
        transcript
            .push_model_calls(vec![a.clone(), b.clone()])
            .unwrap();
        transcript
            .push_tool_results(vec![
                CallResult::failure(&b, "nope"),
                CallResult::success(&a, json!([])),
            ])
            .unwrap();

        assert_eq!(transcript.roles(), [Role::User, Role::Model, Role::Tool]);
        let ids: Vec<_> = transcript.results().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn mismatched_results_are_rejected() {
        let a = call("a", "search_movies");
        let b = call("b", "search_movies");

        let mut transcript = Transcript::new("hi");
        transcript.push_model_calls(vec![a.clone(), b]).unwrap();

        assert_eq!(
            transcript.push_tool_results(vec![CallResult::success(&a, json!(1))]),
            Err(TranscriptError::MissingResult("b".into()))
        );
        assert_eq!(
            transcript.push_tool_results(vec![
                CallResult::success(&a, json!(1)),
                CallResult::success(&call("z", "x"), json!(1)),
            ]),
            Err(TranscriptError::UnexpectedResult("z".into()))
        );
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn call_turn_validation() {
        let mut transcript = Transcript::new("hi");
        assert_eq!(
            transcript.push_model_calls(vec![]),
            Err(TranscriptError::EmptyCallTurn)
        );
        assert_eq!(
            transcript.push_model_calls(vec![call("1", "a"), call("1", "b")]),
            Err(TranscriptError::InvalidCallId("1".into()))
        );
        assert_eq!(
            transcript.push_model_calls(vec![call("", "a")]),
            Err(TranscriptError::InvalidCallId(String::new()))
        );
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn serializes_with_role_tags() {
        let mut transcript = Transcript::new("hi");
        transcript.push_model_text("hello");
        let value = serde_json::to_value(&transcript).unwrap();
        assert_eq!(
            value,
            json!([
                {"role": "user", "text": "hi"},
                {"role": "model", "text": "hello"},
            ])
        );
    }
}
