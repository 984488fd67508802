//! Noise filtering and level classification for outbound console text.

use regex::Regex;

use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::message::{MessageLevel, Outbound};

/// Outcome of classifying one outbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Evaluator noise, never stored
    Noise,
    /// Keep the text with the given level
    Keep(MessageLevel),
}

/// Drops evaluator noise and forces error-looking text to the error level.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    continuation_re: Regex,
    error_re: Regex,
    extra: Vec<Regex>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            continuation_re: Regex::new(r"^\.+$").unwrap(),
            error_re: Regex::new(r"Error:").unwrap(),
            extra: Vec::new(),
        }
    }
}

impl NoiseFilter {
    /// Build a filter with the extra patterns from `config`.
    pub fn from_config(config: &StreamConfig) -> Result<Self> {
        let extra = config
            .extra_noise_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    Error::Config(format!("invalid noise pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            extra,
            ..Self::default()
        })
    }

    /// Check whether `text` is noise: blank, `undefined`, or only dots.
    pub fn is_noise(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.is_empty()
            || trimmed == "undefined"
            || self.continuation_re.is_match(trimmed)
            || self.extra.iter().any(|re| re.is_match(trimmed))
    }

    /// Check whether `text` reports an error.
    pub fn is_error_text(&self, text: &str) -> bool {
        self.error_re.is_match(text)
    }

    /// Classify an outbound payload.
    pub fn classify(&self, outbound: &Outbound) -> Classification {
        if self.is_noise(&outbound.text) {
            return Classification::Noise;
        }

        if self.is_error_text(&outbound.text) {
            Classification::Keep(MessageLevel::Error)
        } else {
            Classification::Keep(outbound.effective_level())
        }
    }
}
