//! Evaluator sessions.
//!
//! An [`Evaluator`] is the read-eval-print engine behind the console. It is
//! synchronous: the session thread pulls one input at a time from the
//! stream's readable side, evaluates it to completion and writes results to
//! the writable side before taking the next input, so evaluations never
//! overlap.
//!
//! Two evaluators ship with the crate:
//!
//! - [`BindingEvaluator`]: in-process, evaluates binding reads and JSON
//!   assignments against the shared [`Environment`](crate::Environment)
//! - [`ProcessEvaluator`]: drives an interpreter subprocess over
//!   line-delimited JSON-RPC

mod binding;
mod process;

pub use binding::BindingEvaluator;
pub use process::{ProcessEvaluator, ProcessEvaluatorConfig};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::message::{MessageLevel, Outbound};
use crate::stream::{InboundReader, SessionInput, StreamAdapter};

/// A synchronous read-eval-print engine.
pub trait Evaluator: Send {
    /// Evaluate one input chunk, writing any results to `out`.
    ///
    /// A returned error is written to the stream as an error record.
    fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()>;

    /// Completion candidates for a partial input.
    fn complete(&mut self, partial: &str) -> Result<Vec<String>>;

    /// Release resources once the session ends.
    fn shutdown(&mut self) {}
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()> {
        (**self).evaluate(input, out)
    }

    fn complete(&mut self, partial: &str) -> Result<Vec<String>> {
        (**self).complete(partial)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// Handle to a running evaluator session thread.
#[derive(Debug)]
pub struct SessionHandle {
    thread: JoinHandle<()>,
    processed: watch::Receiver<u64>,
}

impl SessionHandle {
    /// Spawn a named session thread consuming `reader` and writing to `out`.
    pub fn spawn(
        name: &str,
        evaluator: Box<dyn Evaluator>,
        reader: InboundReader,
        out: StreamAdapter,
    ) -> Result<Self> {
        let (processed_tx, processed) = watch::channel(0u64);

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_session(evaluator, reader, out, processed_tx))
            .map_err(|e| Error::Internal(format!("Failed to spawn session thread '{}': {}", name, e)))?;

        Ok(Self { thread, processed })
    }

    /// Number of input chunks evaluated so far.
    pub fn processed(&self) -> u64 {
        *self.processed.borrow()
    }

    /// Wait until at least `target` chunks have been evaluated.
    pub async fn wait_processed(&self, target: u64) -> Result<()> {
        let mut rx = self.processed.clone();
        rx.wait_for(|count| *count >= target)
            .await
            .map(|_| ())
            .map_err(|_| Error::SessionClosed)
    }

    /// Check if the session thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

fn run_session(
    mut evaluator: Box<dyn Evaluator>,
    mut reader: InboundReader,
    out: StreamAdapter,
    processed_tx: watch::Sender<u64>,
) {
    tracing::debug!("evaluator session started");
    let mut processed = 0u64;

    while let Some(input) = reader.blocking_next() {
        match input {
            SessionInput::Evaluate(chunk) => {
                let source = chunk.trim_end_matches(['\r', '\n']);
                let outcome = catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(source, &out)));

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::debug!(error = %err, "evaluation failed");
                        out.write(error_outbound(&err));
                    }
                    Err(_) => {
                        tracing::error!("evaluator panicked");
                        out.write(Outbound::with_level(
                            MessageLevel::Error,
                            "Error: evaluator panicked",
                        ));
                    }
                }

                processed += 1;
                processed_tx.send_replace(processed);
            }
            SessionInput::Complete { partial, reply } => {
                let completions = catch_unwind(AssertUnwindSafe(|| evaluator.complete(&partial)))
                    .unwrap_or_else(|_| Err(Error::Internal("completion panicked".to_string())));
                // The requester may have timed out already.
                let _ = reply.send(completions);
            }
        }
    }

    evaluator.shutdown();
    tracing::debug!(processed, "evaluator session ended");
}

/// Render an evaluation failure so it classifies as an error record.
fn error_outbound(err: &Error) -> Outbound {
    let message = err.to_string();
    let text = if message.contains("Error:") {
        message
    } else {
        format!("Error: {}", message)
    };
    Outbound::with_level(MessageLevel::Error, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    /// Records inputs and echoes them back.
    struct EchoEvaluator {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Evaluator for EchoEvaluator {
        fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()> {
            self.seen.lock().unwrap().push(input.to_string());
            match input {
                "fail" => Err(Error::evaluation("bad input")),
                "panic" => panic!("boom"),
                _ => {
                    out.write(input);
                    Ok(())
                }
            }
        }

        fn complete(&mut self, partial: &str) -> Result<Vec<String>> {
            Ok(vec![format!("{}x", partial)])
        }
    }

    fn spawn_echo() -> (StreamAdapter, SessionHandle, Arc<Mutex<Vec<String>>>) {
        let (adapter, reader) = StreamAdapter::new(&StreamConfig::new().start_open(true)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let evaluator = EchoEvaluator { seen: seen.clone() };
        let session = SessionHandle::spawn("test-session", Box::new(evaluator), reader, adapter.clone())
            .unwrap();
        (adapter, session, seen)
    }

    #[test]
    fn test_error_outbound_prefixes_once() {
        let plain = error_outbound(&Error::evaluation("bad input"));
        assert_eq!(plain.text, "Error: bad input");

        let prefixed = error_outbound(&Error::evaluation("ReferenceError: x is not defined"));
        assert_eq!(prefixed.text, "ReferenceError: x is not defined");
        assert_eq!(prefixed.level, Some(MessageLevel::Error));
    }

    #[tokio::test]
    async fn test_session_evaluates_in_order() {
        let (adapter, session, seen) = spawn_echo();
        adapter.emit_inbound("one\n");
        adapter.emit_inbound("two\n");
        session.wait_processed(2).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
        let texts: Vec<_> = adapter.drain().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
        adapter.detach();
    }

    #[tokio::test]
    async fn test_session_survives_errors_and_panics() {
        let (adapter, session, _seen) = spawn_echo();
        adapter.emit_inbound("fail");
        adapter.emit_inbound("panic");
        adapter.emit_inbound("after");
        session.wait_processed(3).await.unwrap();

        let records = adapter.drain();
        assert_eq!(records.len(), 3);
        assert!(records[0].is_error());
        assert_eq!(records[0].text, "Error: bad input");
        assert_eq!(records[1].text, "Error: evaluator panicked");
        assert_eq!(records[2].text, "after");
        adapter.detach();
    }

    #[tokio::test]
    async fn test_session_answers_completions() {
        let (adapter, _session, _seen) = spawn_echo();
        let (reply, rx) = oneshot::channel();
        assert!(adapter.send_session(SessionInput::Complete {
            partial: "we".to_string(),
            reply,
        }));

        assert_eq!(rx.await.unwrap().unwrap(), vec!["wex"]);
        adapter.detach();
    }

    #[tokio::test]
    async fn test_session_ends_on_detach() {
        let (adapter, session, _seen) = spawn_echo();
        adapter.detach();

        for _ in 0..100 {
            if session.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(session.is_finished());
        assert!(session.wait_processed(1).await.is_err());
    }
}
