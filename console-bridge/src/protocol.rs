//! Message envelope for the host UI transport.
//!
//! The transport that carries console traffic between the UI process and the
//! controller is external; these types define what travels over it. Requests
//! and replies serialize as `{"type": ..., "data": ...}` so they can be routed
//! by type on the other side.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::message::MessageRecord;

/// Requests arriving from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ConsoleRequest {
    /// A line typed into the console panel
    Command { line: String },
    /// Completion candidates for a partial line
    Complete { request_id: Uuid, partial: String },
    /// Bind a value in the evaluator context
    SetContext { name: String, value: Value },
    /// Fetch buffered output
    Poll,
}

impl ConsoleRequest {
    /// Create a command request.
    pub fn command(line: impl Into<String>) -> Self {
        Self::Command { line: line.into() }
    }

    /// Create a completion request with a fresh id.
    pub fn complete(partial: impl Into<String>) -> Self {
        Self::Complete {
            request_id: Uuid::new_v4(),
            partial: partial.into(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Replies sent back to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ConsoleReply {
    /// Completions keyed to the originating request
    Completion {
        request_id: Uuid,
        completions: Vec<String>,
    },
    /// Drained output records
    Records(Vec<MessageRecord>),
}

impl ConsoleReply {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get the reply type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Completion { .. } => "completion",
            Self::Records(_) => "records",
        }
    }
}

/// Completion candidates for a partial command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub completions: Vec<String>,
}

impl CompletionResult {
    /// Create a result from candidates.
    pub fn new(completions: Vec<String>) -> Self {
        Self { completions }
    }

    /// Result with no candidates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.completions.is_empty()
    }
}
