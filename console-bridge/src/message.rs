//! Output records produced by the console.
//!
//! Every line shown in the UI console panel travels as a [`MessageRecord`]:
//! the text, a [`MessageLevel`] classification and the instant it was written.
//! Writers hand the stream an [`Outbound`] payload; the stream turns it into a
//! record only after noise filtering and level classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity classification of a console line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Log,
    Info,
    Warning,
    Error,
    /// Evaluator output written without an explicit level
    #[default]
    Response,
}

impl MessageLevel {
    /// Parse a level name, accepting the common `warn` spelling.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "log" => Some(Self::Log),
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "response" => Some(Self::Response),
            _ => None,
        }
    }

    /// Lowercase name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Response => "response",
        }
    }
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of console output, immutable once buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Raw content to display
    pub text: String,
    /// Classification
    pub level: MessageLevel,
    /// When the line was written to the stream
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// Create a record stamped with the current time.
    pub fn new(text: impl Into<String>, level: MessageLevel) -> Self {
        Self {
            text: text.into(),
            level,
            timestamp: Utc::now(),
        }
    }

    /// Check if the record is classified as an error.
    pub fn is_error(&self) -> bool {
        self.level == MessageLevel::Error
    }

    /// Format as a single log line.
    pub fn as_log_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.text
        )
    }
}

/// Payload accepted by the writable side of the stream.
///
/// `level` is `None` for bare evaluator output, which becomes
/// [`MessageLevel::Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub text: String,
    pub level: Option<MessageLevel>,
}

impl Outbound {
    /// Create a payload with an explicit level.
    pub fn with_level(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: Some(level),
        }
    }

    /// Level the record will carry before error classification.
    pub fn effective_level(&self) -> MessageLevel {
        self.level.unwrap_or_default()
    }

    /// Best-effort decoding of a JSON payload from the transport.
    ///
    /// Strings become responses; objects contribute `text` (or `message`) and
    /// an optional `level`; anything else is rendered as compact JSON.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::from(text.as_str()),
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .or_else(|| map.get("message"))
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    });
                let level = map
                    .get("level")
                    .and_then(Value::as_str)
                    .and_then(MessageLevel::parse);

                match text {
                    Some(text) => Self { text, level },
                    None => Self::from(value.to_string()),
                }
            }
            other => Self::from(other.to_string()),
        }
    }
}

impl From<&str> for Outbound {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
            level: None,
        }
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Self { text, level: None }
    }
}

impl From<(MessageLevel, String)> for Outbound {
    fn from((level, text): (MessageLevel, String)) -> Self {
        Self::with_level(level, text)
    }
}
