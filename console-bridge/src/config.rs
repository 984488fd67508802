//! Configuration for the stream adapter and console controller.

use std::time::Duration;

// =============================================================================
// Stream Configuration
// =============================================================================

/// Policy applied when the pending buffer reaches capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest pending record to make room (keeps recent output)
    #[default]
    DropOldest,
    /// Discard the incoming record (keeps the earliest output)
    DropNewest,
}

/// Configuration for a [`StreamAdapter`](crate::stream::StreamAdapter).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum records held until the UI transport drains them
    pub max_pending_records: usize,
    /// What to do when `max_pending_records` is reached
    pub overflow_policy: OverflowPolicy,
    /// Whether the adapter starts open
    pub start_open: bool,
    /// Additional regex patterns treated as evaluator noise
    pub extra_noise_patterns: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_pending_records: 1000,
            overflow_policy: OverflowPolicy::DropOldest,
            start_open: false,
            extra_noise_patterns: Vec::new(),
        }
    }
}

impl StreamConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pending buffer capacity.
    pub fn max_pending_records(mut self, max: usize) -> Self {
        self.max_pending_records = max;
        self
    }

    /// Set the overflow policy.
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Start the adapter open instead of closed.
    pub fn start_open(mut self, open: bool) -> Self {
        self.start_open = open;
        self
    }

    /// Add a regex pattern whose matches are dropped as noise.
    pub fn noise_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.extra_noise_patterns.push(pattern.into());
        self
    }
}

// =============================================================================
// Console Configuration
// =============================================================================

/// Configuration for a [`ConsoleController`](crate::controller::ConsoleController).
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Stream adapter configuration
    pub stream: StreamConfig,
    /// Upper bound on loading and injecting the boot script
    pub boot_timeout: Duration,
    /// Upper bound on a single completion request
    pub completion_timeout: Duration,
    /// Name under which the scripting client type is bound
    pub client_binding: String,
    /// Name of the evaluator session thread
    pub session_thread_name: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            boot_timeout: Duration::from_secs(10),
            completion_timeout: Duration::from_secs(2),
            client_binding: "Web3".to_string(),
            session_thread_name: "console-session".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream configuration.
    pub fn stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Set the boot script timeout.
    pub fn boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = timeout;
        self
    }

    /// Set the completion timeout.
    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Set the client binding name.
    pub fn client_binding(mut self, name: impl Into<String>) -> Self {
        self.client_binding = name.into();
        self
    }

    /// Set the session thread name.
    pub fn session_thread_name(mut self, name: impl Into<String>) -> Self {
        self.session_thread_name = name.into();
        self
    }
}
