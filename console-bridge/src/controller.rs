//! Console controller.
//!
//! The [`ConsoleController`] owns one [`StreamAdapter`] and one evaluator
//! session for its whole lifetime. It relays UI commands to the stream's
//! readable side, hands buffered output to the UI transport when polled,
//! binds context variables, answers completion requests and sequences
//! boot script injection:
//!
//! ```text
//! initialize_script_context(host, port)
//!   bind client type ─> close ─> load (timeout, panic capture)
//!     ─> emit boot script ─> wait until evaluated ─> open   (open always runs)
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::boot::{BootScriptLoader, Endpoint};
use crate::config::ConsoleConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, SessionHandle};
use crate::message::{MessageLevel, MessageRecord, Outbound};
use crate::protocol::{CompletionResult, ConsoleReply, ConsoleRequest};
use crate::stream::{SessionInput, StreamAdapter};

// =============================================================================
// Dot-commands
// =============================================================================

/// Controller-level directive typed as `.<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotCommand {
    /// Discard buffered output
    Clear,
    /// List directives
    Help,
    /// Leave the console; handled by the host
    Exit,
    /// Anything else; ignored
    Other(String),
}

impl DotCommand {
    /// Parse a line as a dot-command.
    ///
    /// Matches a leading `.` followed by at least one more character on the
    /// same line, so a bare `.` is not a directive.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('.')?;
        if !rest.chars().next().is_some_and(|c| c != '\n' && c != '\r') {
            return None;
        }

        let name = rest.split_whitespace().next().unwrap_or_default();
        Some(match name {
            "clear" => Self::Clear,
            "help" => Self::Help,
            "exit" => Self::Exit,
            other => Self::Other(other.to_string()),
        })
    }
}

/// What [`ConsoleController::send_input`] did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDisposition {
    /// Queued for the evaluator
    Forwarded,
    /// Consumed as a controller directive
    Directive(DotCommand),
    /// The session is gone
    Rejected,
}

const HELP_TEXT: &str = ".clear  discard pending output\n.exit   close the console\n.help   show this help";

// =============================================================================
// Controller
// =============================================================================

/// Opens the stream and clears the in-flight flag however initialization ends.
struct ReopenGuard<'a> {
    stream: &'a StreamAdapter,
    initializing: &'a AtomicBool,
}

impl Drop for ReopenGuard<'_> {
    fn drop(&mut self) {
        self.stream.open();
        self.initializing.store(false, Ordering::SeqCst);
    }
}

/// Bridges the UI console with an evaluator session.
pub struct ConsoleController {
    config: ConsoleConfig,
    stream: StreamAdapter,
    environment: Environment,
    session: SessionHandle,
    loader: Arc<dyn BootScriptLoader>,
    initializing: AtomicBool,
}

impl ConsoleController {
    /// Create a controller and start its evaluator session.
    ///
    /// `environment` should be the one `evaluator` was constructed with.
    pub fn new(
        config: ConsoleConfig,
        environment: Environment,
        evaluator: impl Evaluator + 'static,
        loader: impl BootScriptLoader + 'static,
    ) -> Result<Self> {
        let (stream, reader) = StreamAdapter::new(&config.stream)?;
        let session = SessionHandle::spawn(
            &config.session_thread_name,
            Box::new(evaluator),
            reader,
            stream.clone(),
        )?;

        Ok(Self {
            config,
            stream,
            environment,
            session,
            loader: Arc::new(loader),
            initializing: AtomicBool::new(false),
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The stream adapter owned by this controller.
    pub fn stream(&self) -> &StreamAdapter {
        &self.stream
    }

    /// The evaluator context bindings.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    // =========================================================================
    // Logging
    // =========================================================================

    /// Log locally and mirror the message into the console.
    pub fn log_at_level(&self, level: MessageLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            MessageLevel::Warning => tracing::warn!(target: "console", "{}", message),
            MessageLevel::Error => tracing::error!(target: "console", "{}", message),
            _ => tracing::info!(target: "console", "{}", message),
        }
        self.stream.write(Outbound::with_level(level, message));
    }

    pub fn log(&self, message: impl Into<String>) {
        self.log_at_level(MessageLevel::Log, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log_at_level(MessageLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log_at_level(MessageLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log_at_level(MessageLevel::Error, message);
    }

    // =========================================================================
    // Script context
    // =========================================================================

    /// Set up the scripting client for `host:port`.
    ///
    /// Binds the client type, mutes the stream, loads the boot script, feeds
    /// it to the evaluator and reopens the stream once it has been evaluated.
    /// The stream is reopened on every exit path, including loader failure,
    /// timeout, panic and cancellation of this future. A second call while
    /// one is outstanding fails with [`Error::InitializationInProgress`].
    ///
    /// If the deadline expires or the future is dropped after the script was
    /// handed to the evaluator, the stream reopens while the script is still
    /// queued or running, so the rest of its output reaches the buffer.
    pub async fn initialize_script_context(&self, host: impl Into<String>, port: u16) -> Result<()> {
        let endpoint = Endpoint::new(host, port)?;

        if self
            .initializing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(%endpoint, "script context initialization already in progress");
            return Err(Error::InitializationInProgress);
        }

        let outcome = {
            let _guard = ReopenGuard {
                stream: &self.stream,
                initializing: &self.initializing,
            };

            self.environment.set(
                self.config.client_binding.clone(),
                serde_json::json!({ "type": "client", "name": self.config.client_binding }),
            );
            self.stream.close();
            self.load_and_inject(&endpoint).await
        };

        if let Err(ref err) = outcome {
            self.error(format!(
                "Script context initialization for {} failed: {}",
                endpoint, err
            ));
        }
        outcome
    }

    async fn load_and_inject(&self, endpoint: &Endpoint) -> Result<()> {
        let timeout_ms = self.config.boot_timeout.as_millis() as u64;
        let deadline = tokio::time::Instant::now() + self.config.boot_timeout;

        let load = AssertUnwindSafe(self.loader.load(endpoint)).catch_unwind();
        let script = match tokio::time::timeout_at(deadline, load).await {
            Err(_) => return Err(Error::timeout(timeout_ms)),
            Ok(Err(_)) => return Err(Error::boot_script("boot script loader panicked")),
            Ok(Ok(script)) => script?,
        };

        if !self.stream.emit_inbound(script) {
            return Err(Error::SessionClosed);
        }
        let target = self.stream.submitted();

        tokio::time::timeout_at(deadline, self.session.wait_processed(target))
            .await
            .map_err(|_| Error::timeout(timeout_ms))??;

        tracing::info!(%endpoint, "script context initialized");
        Ok(())
    }

    /// Run [`initialize_script_context`](Self::initialize_script_context) on
    /// the runtime without waiting for it.
    pub fn spawn_script_initialization(
        self: &Arc<Self>,
        host: impl Into<String>,
        port: u16,
    ) -> JoinHandle<Result<()>> {
        let controller = Arc::clone(self);
        let host = host.into();
        tokio::spawn(async move { controller.initialize_script_context(host, port).await })
    }

    /// Check if a script context initialization is outstanding.
    pub fn is_initializing(&self) -> bool {
        self.initializing.load(Ordering::SeqCst)
    }

    // =========================================================================
    // UI-facing operations
    // =========================================================================

    /// Take all buffered output records.
    pub fn drain_buffer(&self) -> Vec<MessageRecord> {
        self.stream.drain()
    }

    /// Completion candidates for a partial command.
    ///
    /// Never fails: any problem is logged and yields an empty result.
    pub async fn handle_command_completion(&self, partial: &str) -> CompletionResult {
        let (reply, rx) = oneshot::channel();
        let request = SessionInput::Complete {
            partial: partial.to_string(),
            reply,
        };
        if !self.stream.send_session(request) {
            tracing::warn!("completion requested after console teardown");
            return CompletionResult::empty();
        }

        match tokio::time::timeout(self.config.completion_timeout, rx).await {
            Ok(Ok(Ok(completions))) => CompletionResult::new(completions),
            Ok(Ok(Err(err))) => {
                tracing::warn!(error = %err, partial, "completion failed");
                CompletionResult::empty()
            }
            Ok(Err(_)) => {
                tracing::warn!(partial, "evaluator session dropped completion request");
                CompletionResult::empty()
            }
            Err(_) => {
                tracing::warn!(
                    partial,
                    timeout_ms = self.config.completion_timeout.as_millis() as u64,
                    "completion timed out"
                );
                CompletionResult::empty()
            }
        }
    }

    /// Bind `name` in the evaluator context, visible to the next evaluation.
    pub fn set_context_variable(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        tracing::debug!("Setting console context: {}={}", name, value);
        self.environment.set(name, value);
    }

    /// Forward a typed line to the evaluator unless it is a dot-command.
    pub fn send_input(&self, line: &str) -> InputDisposition {
        if let Some(command) = DotCommand::parse(line) {
            self.run_directive(&command);
            return InputDisposition::Directive(command);
        }

        if self.stream.emit_inbound(format!("{}\n", line)) {
            InputDisposition::Forwarded
        } else {
            InputDisposition::Rejected
        }
    }

    fn run_directive(&self, command: &DotCommand) {
        tracing::debug!(?command, "console directive");
        match command {
            DotCommand::Clear => {
                let discarded = self.stream.drain().len();
                tracing::trace!(discarded, "cleared pending console output");
            }
            DotCommand::Help => {
                for line in HELP_TEXT.lines() {
                    self.stream.write(Outbound::with_level(MessageLevel::Info, line));
                }
            }
            DotCommand::Exit | DotCommand::Other(_) => {}
        }
    }

    /// Wait until every forwarded input has been evaluated.
    pub async fn settle(&self) -> Result<()> {
        self.session.wait_processed(self.stream.submitted()).await
    }

    /// Handle one request from the UI transport.
    pub async fn dispatch(&self, request: ConsoleRequest) -> Option<ConsoleReply> {
        match request {
            ConsoleRequest::Command { line } => {
                self.send_input(&line);
                None
            }
            ConsoleRequest::Complete {
                request_id,
                partial,
            } => {
                let result = self.handle_command_completion(&partial).await;
                Some(ConsoleReply::Completion {
                    request_id,
                    completions: result.completions,
                })
            }
            ConsoleRequest::SetContext { name, value } => {
                self.set_context_variable(name, value);
                None
            }
            ConsoleRequest::Poll => Some(ConsoleReply::Records(self.drain_buffer())),
        }
    }
}

impl Drop for ConsoleController {
    fn drop(&mut self) {
        self.stream.detach();
    }
}

impl std::fmt::Debug for ConsoleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleController")
            .field("config", &self.config)
            .field("stream", &self.stream)
            .field("initializing", &self.is_initializing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::TemplateBootLoader;
    use crate::config::StreamConfig;
    use crate::evaluator::BindingEvaluator;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records every chunk it receives.
    #[derive(Clone, Default)]
    struct RecordingEvaluator {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingEvaluator {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Evaluator for RecordingEvaluator {
        fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()> {
            self.seen.lock().unwrap().push(input.to_string());
            out.write(format!("> {}", input));
            Ok(())
        }

        fn complete(&mut self, partial: &str) -> Result<Vec<String>> {
            if partial == "boom" {
                return Err(Error::evaluation("completion engine failed"));
            }
            Ok(vec![format!("{}1", partial), format!("{}2", partial)])
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl BootScriptLoader for FailingLoader {
        async fn load(&self, _endpoint: &Endpoint) -> Result<String> {
            Err(Error::boot_script("connection refused"))
        }
    }

    struct PanickingLoader;

    #[async_trait]
    impl BootScriptLoader for PanickingLoader {
        async fn load(&self, _endpoint: &Endpoint) -> Result<String> {
            panic!("loader exploded")
        }
    }

    /// Blocks until released.
    struct GatedLoader {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl BootScriptLoader for GatedLoader {
        async fn load(&self, endpoint: &Endpoint) -> Result<String> {
            self.gate.notified().await;
            Ok(format!("connect {}", endpoint))
        }
    }

    fn controller_with(
        config: ConsoleConfig,
        loader: impl BootScriptLoader + 'static,
    ) -> (ConsoleController, RecordingEvaluator) {
        let evaluator = RecordingEvaluator::default();
        let controller =
            ConsoleController::new(config, Environment::new(), evaluator.clone(), loader).unwrap();
        (controller, evaluator)
    }

    fn open_controller() -> (ConsoleController, RecordingEvaluator) {
        let config = ConsoleConfig::new().stream(StreamConfig::new().start_open(true));
        controller_with(config, TemplateBootLoader::new("boot"))
    }

    fn texts(records: &[MessageRecord]) -> Vec<String> {
        records.iter().map(|r| r.text.clone()).collect()
    }

    #[test]
    fn test_dot_command_parse() {
        assert_eq!(DotCommand::parse(".clear"), Some(DotCommand::Clear));
        assert_eq!(DotCommand::parse(".help me"), Some(DotCommand::Help));
        assert_eq!(DotCommand::parse(".exit"), Some(DotCommand::Exit));
        assert_eq!(DotCommand::parse(".foo"), Some(DotCommand::Other("foo".to_string())));
        assert_eq!(DotCommand::parse(". "), Some(DotCommand::Other(String::new())));
        assert_eq!(DotCommand::parse("."), None);
        assert_eq!(DotCommand::parse(".\n"), None);
        assert_eq!(DotCommand::parse("foo"), None);
        assert_eq!(DotCommand::parse(" .foo"), None);
    }

    #[tokio::test]
    async fn test_send_input_filters_dot_commands() {
        let (controller, evaluator) = open_controller();

        assert_eq!(
            controller.send_input(".foo"),
            InputDisposition::Directive(DotCommand::Other("foo".to_string()))
        );
        assert_eq!(controller.send_input("."), InputDisposition::Forwarded);
        assert_eq!(controller.send_input("foo"), InputDisposition::Forwarded);
        controller.settle().await.unwrap();

        assert_eq!(evaluator.seen(), vec![".", "foo"]);
    }

    #[tokio::test]
    async fn test_output_flows_to_drain() {
        let (controller, _evaluator) = open_controller();
        controller.send_input("1 + 1");
        controller.settle().await.unwrap();

        let records = controller.drain_buffer();
        assert_eq!(texts(&records), vec!["> 1 + 1"]);
        assert_eq!(records[0].level, MessageLevel::Response);
        assert!(controller.drain_buffer().is_empty());
    }

    #[tokio::test]
    async fn test_log_levels_are_mirrored() {
        let (controller, _evaluator) = open_controller();
        controller.log("l");
        controller.info("i");
        controller.warning("w");
        controller.error("e");
        controller.info("TypeError: promoted");

        let levels: Vec<_> = controller.drain_buffer().iter().map(|r| r.level).collect();
        assert_eq!(
            levels,
            vec![
                MessageLevel::Log,
                MessageLevel::Info,
                MessageLevel::Warning,
                MessageLevel::Error,
                MessageLevel::Error,
            ]
        );
    }

    #[tokio::test]
    async fn test_starts_closed_by_default() {
        let (controller, _evaluator) = controller_with(ConsoleConfig::default(), TemplateBootLoader::new("boot"));
        controller.info("before init");
        assert!(!controller.stream().is_open());
        assert!(controller.drain_buffer().is_empty());
    }

    #[tokio::test]
    async fn test_clear_and_help_directives() {
        let (controller, evaluator) = open_controller();
        controller.info("stale");
        controller.send_input(".clear");
        assert!(controller.drain_buffer().is_empty());

        controller.send_input(".help");
        let records = controller.drain_buffer();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.level == MessageLevel::Info));
        assert!(evaluator.seen().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_mutes_boot_output_and_reopens() {
        let (controller, evaluator) =
            controller_with(ConsoleConfig::default(), TemplateBootLoader::new("connect {url}"));

        controller.initialize_script_context("localhost", 8545).await.unwrap();

        assert!(controller.stream().is_open());
        assert!(!controller.is_initializing());
        assert_eq!(evaluator.seen(), vec!["connect http://localhost:8545"]);
        // The evaluator's echo of the boot script was muted
        assert!(controller.drain_buffer().is_empty());
        assert_eq!(
            controller.environment().get("Web3"),
            Some(json!({"type": "client", "name": "Web3"}))
        );
    }

    #[tokio::test]
    async fn test_initialize_reopens_after_loader_failure() {
        let (controller, evaluator) = controller_with(ConsoleConfig::default(), FailingLoader);

        let err = controller
            .initialize_script_context("localhost", 8545)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BootScript(_)));
        assert!(controller.stream().is_open());
        assert!(evaluator.seen().is_empty());

        let records = controller.drain_buffer();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());
        assert!(records[0].text.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_initialize_reopens_after_loader_panic() {
        let (controller, _evaluator) = controller_with(ConsoleConfig::default(), PanickingLoader);

        let err = controller
            .initialize_script_context("localhost", 8545)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("panicked"));
        assert!(controller.stream().is_open());
        assert!(!controller.is_initializing());
    }

    #[tokio::test]
    async fn test_initialize_times_out_and_reopens() {
        let config = ConsoleConfig::new().boot_timeout(Duration::from_millis(50));
        let gate = Arc::new(Notify::new());
        let (controller, evaluator) = controller_with(config, GatedLoader { gate });

        let err = controller
            .initialize_script_context("localhost", 8545)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { duration_ms: 50 }));
        assert!(controller.stream().is_open());
        assert!(evaluator.seen().is_empty());
    }

    /// Takes longer than any short boot timeout before echoing.
    struct SlowEvaluator;

    impl Evaluator for SlowEvaluator {
        fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()> {
            std::thread::sleep(Duration::from_millis(200));
            out.write(format!("late {}", input));
            Ok(())
        }

        fn complete(&mut self, _partial: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_timeout_during_boot_evaluation_lets_echo_through() {
        let config = ConsoleConfig::new().boot_timeout(Duration::from_millis(50));
        let controller = ConsoleController::new(
            config,
            Environment::new(),
            SlowEvaluator,
            TemplateBootLoader::new("boot"),
        )
        .unwrap();

        let err = controller
            .initialize_script_context("localhost", 8545)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { duration_ms: 50 }));
        assert!(controller.stream().is_open());

        // Reopening wins over muting: the unfinished script's echo is kept
        controller.settle().await.unwrap();
        let records = controller.drain_buffer();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_error());
        assert_eq!(records[1].text, "late boot");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_leaves_stream_untouched() {
        let (controller, _evaluator) = open_controller();
        let err = controller.initialize_script_context("", 8545).await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(controller.stream().is_open());
        assert!(!controller.environment().contains("Web3"));
    }

    #[tokio::test]
    async fn test_concurrent_initialization_is_rejected() {
        let gate = Arc::new(Notify::new());
        let evaluator = RecordingEvaluator::default();
        let controller = Arc::new(
            ConsoleController::new(
                ConsoleConfig::default(),
                Environment::new(),
                evaluator.clone(),
                GatedLoader { gate: gate.clone() },
            )
            .unwrap(),
        );

        let first = controller.spawn_script_initialization("localhost", 8545);
        while !controller.is_initializing() {
            tokio::task::yield_now().await;
        }
        assert!(!controller.stream().is_open());

        let second = controller.initialize_script_context("localhost", 8546).await;
        assert!(matches!(second, Err(Error::InitializationInProgress)));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(controller.stream().is_open());
        assert_eq!(evaluator.seen(), vec!["connect localhost:8545"]);
    }

    #[tokio::test]
    async fn test_cancelled_initialization_reopens() {
        let gate = Arc::new(Notify::new());
        let evaluator = RecordingEvaluator::default();
        let controller = Arc::new(
            ConsoleController::new(
                ConsoleConfig::default(),
                Environment::new(),
                evaluator,
                GatedLoader { gate },
            )
            .unwrap(),
        );

        let task = controller.spawn_script_initialization("localhost", 8545);
        while !controller.is_initializing() {
            tokio::task::yield_now().await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(controller.stream().is_open());
        assert!(!controller.is_initializing());
    }

    #[tokio::test]
    async fn test_completion() {
        let (controller, _evaluator) = open_controller();
        let result = controller.handle_command_completion("we").await;
        assert_eq!(result.completions, vec!["we1", "we2"]);
    }

    #[tokio::test]
    async fn test_completion_failure_is_empty() {
        let (controller, _evaluator) = open_controller();
        assert!(controller.handle_command_completion("boom").await.is_empty());

        controller.stream().detach();
        assert!(controller.handle_command_completion("we").await.is_empty());
    }

    #[tokio::test]
    async fn test_context_variables_reach_evaluator() {
        let env = Environment::new();
        let config = ConsoleConfig::new().stream(StreamConfig::new().start_open(true));
        let controller = ConsoleController::new(
            config,
            env.clone(),
            BindingEvaluator::new(env.clone()),
            TemplateBootLoader::default(),
        )
        .unwrap();

        controller.set_context_variable("chainId", json!(1337));
        controller.set_context_variable("chainId", json!(5));
        controller.send_input("chainId");
        controller.send_input("missing");
        controller.settle().await.unwrap();

        let records = controller.drain_buffer();
        assert_eq!(texts(&records), vec!["5", "ReferenceError: missing is not defined"]);
        assert!(records[1].is_error());
    }

    #[tokio::test]
    async fn test_dispatch() {
        let (controller, _evaluator) = open_controller();

        let reply = controller.dispatch(ConsoleRequest::command("ping")).await;
        assert!(reply.is_none());
        controller.settle().await.unwrap();

        let request = ConsoleRequest::complete("pi");
        let request_id = match &request {
            ConsoleRequest::Complete { request_id, .. } => *request_id,
            _ => unreachable!(),
        };
        assert_eq!(
            controller.dispatch(request).await,
            Some(ConsoleReply::Completion {
                request_id,
                completions: vec!["pi1".to_string(), "pi2".to_string()],
            })
        );

        match controller.dispatch(ConsoleRequest::Poll).await {
            Some(ConsoleReply::Records(records)) => assert_eq!(texts(&records), vec!["> ping"]),
            other => panic!("expected records, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_teardown_on_drop() {
        let (controller, _evaluator) = open_controller();
        let stream = controller.stream().clone();
        drop(controller);

        assert!(!stream.is_attached());
        stream.write("late");
        assert!(stream.drain().is_empty());
    }
}
