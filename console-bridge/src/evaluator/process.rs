//! Interpreter subprocess evaluator.
//!
//! Spawns an interpreter that speaks line-delimited JSON-RPC 2.0 over
//! stdin/stdout. The interpreter announces itself with a `ready`
//! notification and then answers these methods:
//!
//! | method          | params                  | result                          |
//! |-----------------|-------------------------|---------------------------------|
//! | `evaluate`      | `{code}`                | `{output: [text \| {text, level}], error?}` |
//! | `complete`      | `{partial}`             | `{completions: [string]}`       |
//! | `set_variables` | `{variables: {..}}`     | ignored                         |
//! | `shutdown`      | none                    | ignored                         |
//!
//! Environment bindings are pushed with `set_variables` before the next
//! `evaluate` or `complete` whenever they changed since the last push.
//!
//! The child's stdout and stderr are read on their own threads. Replies reach
//! the session through a channel so every request is bounded by
//! [`ProcessEvaluatorConfig::timeout_ms`]; an interpreter that misses the
//! deadline is killed. Stderr lines are forwarded to `tracing` so a chatty
//! interpreter never blocks on a full pipe.

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::message::Outbound;
use crate::stream::StreamAdapter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::Evaluator;

const STDERR_EXCERPT_CHARS: usize = 500;

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

impl JsonRpcRequest {
    fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
    id: Option<u64>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Result payload of an `evaluate` call.
#[derive(Debug, Clone, Default, Deserialize)]
struct EvaluateReply {
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Configuration for the interpreter subprocess.
#[derive(Debug, Clone)]
pub struct ProcessEvaluatorConfig {
    /// Interpreter program; `~` is expanded and bare names are looked up on `PATH`
    pub program: String,
    /// Arguments passed to the interpreter
    pub args: Vec<String>,
    /// Extra environment variables for the child process
    pub env: Vec<(String, String)>,
    /// Timeout for the ready handshake and for each request, in milliseconds
    pub timeout_ms: u64,
}

impl ProcessEvaluatorConfig {
    /// Create a config for `program` with default settings.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout_ms: 30_000,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set a child environment variable.
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the program to an executable path.
    fn resolve_program(&self) -> Result<String> {
        let expanded = shellexpand::tilde(&self.program).to_string();

        which::which(&expanded)
            .map(|path| path.to_string_lossy().to_string())
            .map_err(|e| {
                Error::Config(format!(
                    "interpreter '{}' not found: {}",
                    self.program, e
                ))
            })
    }
}

/// Read `stream` line by line on a named thread until EOF.
///
/// `on_line` is dropped when the thread ends, which disconnects any channel
/// it captured.
fn spawn_line_reader<R, F>(name: &str, stream: R, mut on_line: F) -> Result<()>
where
    R: Read + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            for chunk in BufReader::new(stream).split(b'\n') {
                match chunk {
                    Ok(bytes) => on_line(String::from_utf8_lossy(&bytes).into_owned()),
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        })
        .map(|_| ())
        .map_err(|e| Error::SubprocessComm(format!("Failed to spawn {} thread: {}", name, e)))
}

/// Leading stderr output, kept for startup failure messages.
#[derive(Debug)]
struct StderrExcerpt {
    text: Arc<Mutex<String>>,
    closed: Receiver<()>,
}

impl StderrExcerpt {
    /// Wait briefly for stderr to close, then take what was captured.
    fn collect(&self, grace: Duration) -> String {
        let _ = self.closed.recv_timeout(grace);
        let text = self.text.lock().unwrap_or_else(PoisonError::into_inner);
        text.trim().chars().take(STDERR_EXCERPT_CHARS).collect()
    }
}

/// Evaluator backed by an interpreter subprocess.
pub struct ProcessEvaluator {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<String>,
    next_id: u64,
    config: ProcessEvaluatorConfig,
    env: Environment,
    synced_generation: Option<u64>,
    shut_down: bool,
}

impl ProcessEvaluator {
    /// Spawn the interpreter and wait for its `ready` notification.
    pub fn spawn(config: ProcessEvaluatorConfig, env: Environment) -> Result<Self> {
        let program = config.resolve_program()?;
        let startup_context = format!("program='{}', args={:?}", program, config.args);

        let mut cmd = Command::new(&program);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::SubprocessComm(format!(
                "Failed to spawn interpreter ({startup_context}): {e}"
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdin handle".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdout handle".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stderr handle".to_string())
        })?;

        let started = Self::start_readers(stdout, stderr);
        let (replies, excerpt) = match started {
            Ok(readers) => readers,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        if let Err(err) = Self::wait_for_ready(&replies, config.timeout(), &startup_context) {
            let _ = child.kill();
            let _ = child.wait();
            let stderr_excerpt = excerpt.collect(Duration::from_millis(200));
            return Err(match err {
                Error::SubprocessComm(message) if !stderr_excerpt.is_empty() => {
                    Error::SubprocessComm(format!("{message}; stderr: {stderr_excerpt}"))
                }
                other => other,
            });
        }

        tracing::debug!(%startup_context, "interpreter ready");

        Ok(Self {
            child,
            stdin,
            replies,
            next_id: 1,
            config,
            env,
            synced_generation: None,
            shut_down: false,
        })
    }

    fn start_readers(
        stdout: impl Read + Send + 'static,
        stderr: impl Read + Send + 'static,
    ) -> Result<(Receiver<String>, StderrExcerpt)> {
        let (reply_tx, replies) = mpsc::channel();
        spawn_line_reader("interpreter-stdout", stdout, move |line| {
            let _ = reply_tx.send(line);
        })?;

        let text = Arc::new(Mutex::new(String::new()));
        let (closed_tx, closed) = mpsc::channel::<()>();
        // `closed` disconnects once the stderr reader exits
        let sink = (Arc::clone(&text), closed_tx);
        spawn_line_reader("interpreter-stderr", stderr, move |line| {
            let (captured, _closed) = &sink;
            tracing::debug!(target: "console::interpreter", "{}", line);
            let mut text = captured.lock().unwrap_or_else(PoisonError::into_inner);
            if text.len() < STDERR_EXCERPT_CHARS {
                text.push_str(&line);
                text.push('\n');
            }
        })?;

        Ok((replies, StderrExcerpt { text, closed }))
    }

    fn wait_for_ready(
        replies: &Receiver<String>,
        timeout: Duration,
        startup_context: &str,
    ) -> Result<()> {
        let line = match replies.recv_timeout(timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::timeout(timeout.as_millis() as u64));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::SubprocessComm(format!(
                    "Interpreter exited before sending ready message ({startup_context})"
                )));
            }
        };

        let msg: Value = serde_json::from_str(&line).map_err(|e| {
            Error::SubprocessComm(format!(
                "Invalid ready message ({startup_context}): {e}; payload={}",
                line.trim()
            ))
        })?;

        if msg.get("method").and_then(Value::as_str) != Some("ready") {
            return Err(Error::SubprocessComm(format!(
                "Expected ready message ({startup_context}), got: {}",
                line.trim()
            )));
        }

        Ok(())
    }

    fn send_request(&mut self, method: &str, params: Value) -> Result<Value> {
        if self.shut_down {
            return Err(Error::SubprocessComm(
                "Interpreter is no longer running".to_string(),
            ));
        }

        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(method, params, id);
        let request_json = serde_json::to_string(&request)?;

        writeln!(self.stdin, "{}", request_json).map_err(|e| {
            Error::SubprocessComm(format!("Failed to send request: {}", e))
        })?;
        self.stdin.flush().map_err(|e| {
            Error::SubprocessComm(format!("Failed to flush stdin: {}", e))
        })?;

        let deadline = Instant::now() + self.config.timeout();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.replies.recv_timeout(remaining) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        method,
                        timeout_ms = self.config.timeout_ms,
                        "interpreter missed request deadline, killing it"
                    );
                    self.terminate();
                    return Err(Error::timeout(self.config.timeout_ms));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::SubprocessComm(
                        "Interpreter closed unexpectedly".to_string(),
                    ));
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response: JsonRpcResponse = serde_json::from_str(line)?;

            if response.id == Some(id) {
                if let Some(error) = response.error {
                    return Err(Error::evaluation(format!(
                        "Error: {} ({})",
                        error.message, error.code
                    )));
                }
                return Ok(response.result.unwrap_or(Value::Null));
            }
            // Notifications and stale responses are skipped
            tracing::trace!(line, "skipping unrelated interpreter message");
        }
    }

    /// Kill the child without the shutdown handshake.
    fn terminate(&mut self) {
        self.shut_down = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    /// Push environment bindings if they changed since the last push.
    fn sync_environment(&mut self) -> Result<()> {
        let generation = self.env.generation();
        if self.synced_generation == Some(generation) {
            return Ok(());
        }

        let params = serde_json::json!({ "variables": self.env.snapshot() });
        self.send_request("set_variables", params)?;
        self.synced_generation = Some(generation);
        Ok(())
    }

    /// Check if the subprocess is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Evaluator for ProcessEvaluator {
    fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()> {
        self.sync_environment()?;

        let result = self.send_request("evaluate", serde_json::json!({ "code": input }))?;
        let reply: EvaluateReply = serde_json::from_value(result)?;

        for item in &reply.output {
            out.write(Outbound::from_value(item));
        }

        match reply.error {
            Some(error) => Err(Error::evaluation(error)),
            None => Ok(()),
        }
    }

    fn complete(&mut self, partial: &str) -> Result<Vec<String>> {
        self.sync_environment()?;

        let result = self.send_request("complete", serde_json::json!({ "partial": partial }))?;
        let completions = result
            .get("completions")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        Ok(completions)
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let _ = self.send_request("shutdown", Value::Null);
        self.shut_down = true;
        let _ = self.child.wait();
    }
}

impl Drop for ProcessEvaluator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ProcessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEvaluator")
            .field("config", &self.config)
            .field("next_id", &self.next_id)
            .field("synced_generation", &self.synced_generation)
            .finish()
    }
}
