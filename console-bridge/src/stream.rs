//! Duplex virtual stream between the UI console and the evaluator session.
//!
//! The [`StreamAdapter`] has two sides:
//!
//! - **Writable**: the evaluator and the controller's log calls write
//!   [`Outbound`] payloads. Each one is filtered, classified, timestamped and,
//!   only while the adapter is open, appended to a bounded FIFO that the UI
//!   transport drains by polling.
//! - **Readable**: [`StreamAdapter::emit_inbound`] queues input chunks that the
//!   evaluator session pulls from its [`InboundReader`] with a blocking receive.
//!
//! ```text
//!  UI command ──emit_inbound──> [inbound queue] ──> InboundReader ──> Evaluator
//!                                                                        │
//!  UI poll <──drain── [pending FIFO] <──(open? filter, classify)── write <┘
//! ```
//!
//! All outbound state sits behind one mutex so UI polling and evaluator writes
//! can come from different threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::config::{OverflowPolicy, StreamConfig};
use crate::error::Result;
use crate::filter::{Classification, NoiseFilter};
use crate::message::{MessageRecord, Outbound};

/// Input delivered to the evaluator session, in arrival order.
#[derive(Debug)]
pub enum SessionInput {
    /// A chunk of source to evaluate
    Evaluate(String),
    /// A completion request answered on `reply`
    Complete {
        partial: String,
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
}

/// Counters describing what happened to outbound writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Records appended to the pending buffer
    pub written: u64,
    /// Writes dropped as noise
    pub filtered: u64,
    /// Writes dropped because the adapter was closed or detached
    pub muted: u64,
    /// Records lost to the overflow policy
    pub evicted: u64,
}

#[derive(Debug)]
struct StreamState {
    open: bool,
    attached: bool,
    pending: VecDeque<MessageRecord>,
    inbound: Option<mpsc::UnboundedSender<SessionInput>>,
    stats: StreamStats,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<StreamState>,
    submitted: AtomicU64,
    filter: NoiseFilter,
    capacity: usize,
    overflow_policy: OverflowPolicy,
}

/// Line-oriented duplex stream shared by the controller and evaluator session.
///
/// Cloning yields another handle to the same stream.
#[derive(Debug, Clone)]
pub struct StreamAdapter {
    shared: Arc<Shared>,
}

/// Readable side of the stream, owned by the evaluator session.
#[derive(Debug)]
pub struct InboundReader {
    rx: mpsc::UnboundedReceiver<SessionInput>,
}

impl InboundReader {
    /// Block the current thread until the next input arrives.
    ///
    /// Returns `None` once the adapter is detached. Must not be called from
    /// within an async context.
    pub fn blocking_next(&mut self) -> Option<SessionInput> {
        self.rx.blocking_recv()
    }

    /// Wait asynchronously for the next input.
    pub async fn next(&mut self) -> Option<SessionInput> {
        self.rx.recv().await
    }
}

impl StreamAdapter {
    /// Create an adapter and the reader for its readable side.
    pub fn new(config: &StreamConfig) -> Result<(Self, InboundReader)> {
        let filter = NoiseFilter::from_config(config)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let state = StreamState {
            open: config.start_open,
            attached: true,
            pending: VecDeque::new(),
            inbound: Some(tx),
            stats: StreamStats::default(),
        };

        let adapter = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                submitted: AtomicU64::new(0),
                filter,
                // A zero capacity would drop everything; keep at least one record.
                capacity: config.max_pending_records.max(1),
                overflow_policy: config.overflow_policy,
            }),
        };

        Ok((adapter, InboundReader { rx }))
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Writable side
    // =========================================================================

    /// Write one payload.
    ///
    /// Noise is dropped, error-looking text is reclassified, and the record is
    /// buffered only while the adapter is open. Never fails.
    pub fn write(&self, input: impl Into<Outbound>) {
        let outbound = input.into();
        let classification = self.shared.filter.classify(&outbound);
        let mut state = self.lock();

        let level = match classification {
            Classification::Noise => {
                state.stats.filtered += 1;
                return;
            }
            Classification::Keep(level) => level,
        };

        if !state.open || !state.attached {
            state.stats.muted += 1;
            tracing::trace!(record_level = %level, "console stream closed, dropping write");
            return;
        }

        let record = MessageRecord::new(outbound.text, level);

        if state.pending.len() >= self.shared.capacity {
            state.stats.evicted += 1;
            match self.shared.overflow_policy {
                OverflowPolicy::DropOldest => {
                    state.pending.pop_front();
                }
                OverflowPolicy::DropNewest => {
                    tracing::debug!(
                        capacity = self.shared.capacity,
                        "console buffer full, discarding newest record"
                    );
                    return;
                }
            }
        }

        state.pending.push_back(record);
        state.stats.written += 1;
    }

    /// Open the stream. Idempotent; no effect after [`detach`](Self::detach).
    pub fn open(&self) {
        let mut state = self.lock();
        if state.attached {
            state.open = true;
        }
    }

    /// Close the stream; writes are lost until it is reopened. Idempotent.
    pub fn close(&self) {
        self.lock().open = false;
    }

    /// Check if writes are currently buffered.
    pub fn is_open(&self) -> bool {
        let state = self.lock();
        state.open && state.attached
    }

    /// Take every pending record, oldest first, leaving the buffer empty.
    pub fn drain(&self) -> Vec<MessageRecord> {
        Vec::from(std::mem::take(&mut self.lock().pending))
    }

    /// Number of records waiting to be drained.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Snapshot of the write counters.
    pub fn stats(&self) -> StreamStats {
        self.lock().stats
    }

    // =========================================================================
    // Readable side
    // =========================================================================

    /// Deliver a chunk to the evaluator's readable side.
    ///
    /// Returns `false` if the session is gone. Never fails.
    pub fn emit_inbound(&self, chunk: impl Into<String>) -> bool {
        let accepted = self.send_session(SessionInput::Evaluate(chunk.into()));
        if accepted {
            self.shared.submitted.fetch_add(1, Ordering::SeqCst);
        }
        accepted
    }

    /// Number of chunks accepted by [`emit_inbound`](Self::emit_inbound).
    pub fn submitted(&self) -> u64 {
        self.shared.submitted.load(Ordering::SeqCst)
    }

    pub(crate) fn send_session(&self, input: SessionInput) -> bool {
        let state = self.lock();
        match state.inbound.as_ref() {
            Some(tx) => tx.send(input).is_ok(),
            None => {
                tracing::trace!("console stream detached, dropping inbound input");
                false
            }
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Release the readable side and mute the stream for good.
    ///
    /// The evaluator session ends once it has consumed queued input. Later
    /// writes, emits and opens are no-ops. Idempotent.
    pub fn detach(&self) {
        let mut state = self.lock();
        state.attached = false;
        state.open = false;
        state.inbound = None;
        state.pending.clear();
    }

    /// Check if the stream is still attached.
    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }
}
