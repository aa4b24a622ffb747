//! Action Buffer - Debounced, Size-bounded Batch Flushing
//!
//! Producers record actions through a cloneable [`ActionBuffer`] handle. A
//! single actor task owns the persistent queue and the idle timer, so every
//! append and drain runs to completion before the next message is looked at.
//!
//! ## Architecture
//!
//! ```text
//! Producer 1 ──┐
//! Producer 2 ──┤──► BufferActor ──► PersistentQueue ──► drain ──► Transport
//! Router     ──┘        │
//!                       └── idle timer (one live Sleep at most)
//! ```
//!
//! ## Flush Triggers
//!
//! - **Idle**: every record re-arms a quiet-period timer; when it elapses the
//!   queue is flushed.
//! - **Threshold**: when an append brings the queue to `flush_threshold`
//!   records, the queue is flushed immediately.
//!
//! Records that arrive while a batch is in flight are queued for the next
//! cycle. A failed delivery loses its batch; nothing is retried.

mod actor;

use crate::clock::{ActionClock, SystemClock};
use crate::config::BufferConfig;
use crate::record::{ActionInput, ActionRecord, RecordError};
use crate::store::ActionStore;
use crate::transport::Transport;
use actor::BufferActor;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Scheduler state, derived from the actor's timer and in-flight delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// No timer armed, nothing in flight
    Idle,
    /// Idle timer armed
    Scheduled,
    /// A batch is being delivered
    Flushing,
}

/// What started a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The quiet period elapsed
    Idle,
    /// An append reached the flush threshold
    Threshold,
    /// Explicit [`ActionBuffer::flush`]
    Manual,
    /// Records queued during the previous flush already reached the threshold
    Backlog,
}

/// Counters kept by the buffer actor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Records appended through `record()`
    pub recorded: u64,
    /// Records restored from the store at startup
    pub restored: u64,
    /// Flushes that handed a non-empty batch to the transport
    pub flushes_started: u64,
    /// Flushes that found the queue empty
    pub empty_flushes: u64,
    pub batches_delivered: u64,
    pub batches_failed: u64,
    pub records_delivered: u64,
    /// Records dropped with a failed batch
    pub records_lost: u64,
    /// Store writes that failed (records kept in memory)
    pub persist_failures: u64,
}

/// Error type for buffer queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("action buffer is closed")]
    Closed,
}

/// Messages for the buffer actor
pub(crate) enum BufferMessage {
    Record(ActionRecord),
    Flush,
    Size {
        response_tx: oneshot::Sender<usize>,
    },
    State {
        response_tx: oneshot::Sender<FlushState>,
    },
    Pending {
        response_tx: oneshot::Sender<Vec<ActionRecord>>,
    },
    Stats {
        response_tx: oneshot::Sender<BufferStats>,
    },
    /// Wait for an in-flight delivery, then stop. The backlog stays persisted.
    Shutdown {
        response_tx: oneshot::Sender<()>,
    },
}

/// Handle for recording actions into a running buffer
#[derive(Clone)]
pub struct ActionBuffer<C: ActionClock = SystemClock> {
    tx: mpsc::UnboundedSender<BufferMessage>,
    clock: C,
}

impl<C: ActionClock> ActionBuffer<C> {
    /// Normalize and enqueue an action. Never waits.
    ///
    /// Fails only for an invalid action or a stopped buffer; storage and
    /// delivery problems are handled inside the buffer.
    pub fn record(&self, input: ActionInput) -> Result<(), RecordError> {
        let record = input.normalize(self.clock.now_secs())?;
        self.send_record(record)
    }

    /// Enqueue a flat JSON action object, splitting core fields from extras.
    pub fn record_flat(&self, object: Map<String, Value>) -> Result<(), RecordError> {
        let record = ActionRecord::from_flat(object, self.clock.now_secs())?;
        self.send_record(record)
    }

    fn send_record(&self, record: ActionRecord) -> Result<(), RecordError> {
        self.tx
            .send(BufferMessage::Record(record))
            .map_err(|_| RecordError::Closed)
    }

    /// Ask for an immediate flush. Ignored while a batch is in flight.
    pub fn flush(&self) -> Result<(), BufferError> {
        self.tx
            .send(BufferMessage::Flush)
            .map_err(|_| BufferError::Closed)
    }

    pub async fn size(&self) -> Result<usize, BufferError> {
        self.query(|response_tx| BufferMessage::Size { response_tx })
            .await
    }

    pub async fn state(&self) -> Result<FlushState, BufferError> {
        self.query(|response_tx| BufferMessage::State { response_tx })
            .await
    }

    /// Queued records, oldest first
    pub async fn pending(&self) -> Result<Vec<ActionRecord>, BufferError> {
        self.query(|response_tx| BufferMessage::Pending { response_tx })
            .await
    }

    pub async fn stats(&self) -> Result<BufferStats, BufferError> {
        self.query(|response_tx| BufferMessage::Stats { response_tx })
            .await
    }

    /// Graceful shutdown - waits for an in-flight delivery to settle
    pub async fn shutdown(&self) {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .tx
            .send(BufferMessage::Shutdown { response_tx })
            .is_ok()
        {
            let _ = response_rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> BufferMessage,
    ) -> Result<T, BufferError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(make(response_tx))
            .map_err(|_| BufferError::Closed)?;
        response_rx.await.map_err(|_| BufferError::Closed)
    }
}

/// Spawn a buffer actor over `store` and return its handle + join handle.
///
/// The persisted backlog is restored before this returns. Must be called
/// from within a tokio runtime.
pub fn spawn_action_buffer<S, T>(
    store: S,
    transport: T,
    config: &BufferConfig,
) -> (ActionBuffer, tokio::task::JoinHandle<()>)
where
    S: ActionStore,
    T: Transport,
{
    spawn_action_buffer_with_clock(store, transport, config, SystemClock)
}

/// Same as [`spawn_action_buffer`] with an explicit timestamp clock
pub fn spawn_action_buffer_with_clock<S, T, C>(
    store: S,
    transport: T,
    config: &BufferConfig,
    clock: C,
) -> (ActionBuffer<C>, tokio::task::JoinHandle<()>)
where
    S: ActionStore,
    T: Transport,
    C: ActionClock,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = BufferActor::new(store, transport, config, rx);
    let task = tokio::spawn(actor.run());

    (ActionBuffer { tx, clock }, task)
}
