//! The buffer actor: owns the queue, the idle timer and the in-flight batch.

use super::{BufferMessage, BufferStats, FlushState, FlushTrigger};
use crate::config::BufferConfig;
use crate::queue::PersistentQueue;
use crate::record::{ActionBatch, ActionRecord};
use crate::store::ActionStore;
use crate::transport::{Transport, TransportError};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

type DeliveryOutcome = Result<Result<(), TransportError>, JoinError>;

/// A batch handed to the transport and not yet settled
struct InFlight {
    task: JoinHandle<Result<(), TransportError>>,
    records: usize,
    trigger: FlushTrigger,
}

pub(super) struct BufferActor<S: ActionStore, T: Transport> {
    queue: PersistentQueue<S>,
    transport: Arc<T>,
    idle_timeout: Duration,
    flush_threshold: usize,
    rx: mpsc::UnboundedReceiver<BufferMessage>,
    /// The only live idle timer
    idle_timer: Option<Pin<Box<Sleep>>>,
    in_flight: Option<InFlight>,
    stats: BufferStats,
}

impl<S: ActionStore, T: Transport> BufferActor<S, T> {
    pub(super) fn new(
        store: S,
        transport: T,
        config: &BufferConfig,
        rx: mpsc::UnboundedReceiver<BufferMessage>,
    ) -> Self {
        let mut queue = PersistentQueue::new(store);
        let restored = queue.load();

        BufferActor {
            queue,
            transport: Arc::new(transport),
            idle_timeout: config.idle_timeout,
            flush_threshold: config.flush_threshold,
            rx,
            idle_timer: None,
            in_flight: None,
            stats: BufferStats {
                restored: restored as u64,
                ..Default::default()
            },
        }
    }

    /// Run the actor loop until shutdown or until every handle is dropped
    pub(super) async fn run(mut self) {
        // A restored backlog ships after one quiet period even with no new activity
        if !self.queue.is_empty() {
            self.arm_idle_timer();
        }

        loop {
            // A settled delivery fires at most once per flush, so it goes first
            // and a busy mailbox cannot hold it back. The timer goes last: a
            // record still in the mailbox must re-arm it before it can fire.
            tokio::select! {
                biased;

                outcome = delivery_settled(&mut self.in_flight) => {
                    self.finish_flush(outcome);
                }
                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        if let Some(response_tx) = self.handle_message(msg) {
                            let mut acks = self.stop().await;
                            acks.push(response_tx);
                            for ack in acks {
                                let _ = ack.send(());
                            }
                            break;
                        }
                    }
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                _ = idle_elapsed(&mut self.idle_timer) => {
                    self.idle_timer = None;
                    self.begin_flush(FlushTrigger::Idle);
                }
            }
        }
    }

    /// Handle one message. Returns the ack channel when asked to shut down.
    fn handle_message(&mut self, msg: BufferMessage) -> Option<oneshot::Sender<()>> {
        match msg {
            BufferMessage::Record(record) => self.handle_record(record),
            BufferMessage::Flush => {
                if self.in_flight.is_some() {
                    debug!("Flush requested while a batch is in flight, ignoring");
                } else {
                    self.begin_flush(FlushTrigger::Manual);
                }
            }
            BufferMessage::Size { response_tx } => {
                let _ = response_tx.send(self.queue.size());
            }
            BufferMessage::State { response_tx } => {
                let _ = response_tx.send(self.state());
            }
            BufferMessage::Pending { response_tx } => {
                let _ = response_tx.send(self.queue.pending());
            }
            BufferMessage::Stats { response_tx } => {
                let _ = response_tx.send(self.stats());
            }
            BufferMessage::Shutdown { response_tx } => return Some(response_tx),
        }
        None
    }

    fn handle_record(&mut self, record: ActionRecord) {
        self.queue.append(record);
        self.stats.recorded += 1;

        // Records arriving mid-flush wait for the flush to settle
        if self.in_flight.is_some() {
            return;
        }

        if self.queue.size() >= self.flush_threshold {
            self.begin_flush(FlushTrigger::Threshold);
        } else {
            self.arm_idle_timer();
        }
    }

    fn arm_idle_timer(&mut self) {
        self.cancel_idle_timer();
        self.idle_timer = Some(Box::pin(tokio::time::sleep(self.idle_timeout)));
    }

    fn cancel_idle_timer(&mut self) {
        self.idle_timer = None;
    }

    /// Drain the queue and hand the batch to the transport
    fn begin_flush(&mut self, trigger: FlushTrigger) {
        debug_assert!(self.in_flight.is_none(), "Precondition: one flush at a time");
        self.cancel_idle_timer();

        let records = self.queue.drain();
        if records.is_empty() {
            self.stats.empty_flushes += 1;
            debug!("{:?} flush found an empty queue", trigger);
            return;
        }

        let batch = ActionBatch::new(records);
        let len = batch.len();
        self.stats.flushes_started += 1;
        debug!("{:?} flush of {} actions", trigger, len);

        let transport = Arc::clone(&self.transport);
        let task = tokio::spawn(async move { transport.deliver(&batch).await });
        self.in_flight = Some(InFlight {
            task,
            records: len,
            trigger,
        });
    }

    /// Record the outcome of the in-flight batch. Failed batches are dropped.
    fn settle(&mut self, outcome: DeliveryOutcome) {
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        let records = flight.records as u64;

        match outcome {
            Ok(Ok(())) => {
                self.stats.batches_delivered += 1;
                self.stats.records_delivered += records;
                info!("Delivered {} actions ({:?} flush)", records, flight.trigger);
            }
            Ok(Err(e)) => {
                self.stats.batches_failed += 1;
                self.stats.records_lost += records;
                warn!("Dropping {} actions after failed delivery: {}", records, e);
            }
            Err(e) => {
                self.stats.batches_failed += 1;
                self.stats.records_lost += records;
                error!("Delivery task for {} actions did not complete: {}", records, e);
            }
        }
    }

    /// Settle the batch, then schedule whatever queued up meanwhile
    fn finish_flush(&mut self, outcome: DeliveryOutcome) {
        self.settle(outcome);

        if self.queue.size() >= self.flush_threshold {
            self.begin_flush(FlushTrigger::Backlog);
        } else if !self.queue.is_empty() {
            self.arm_idle_timer();
        }
    }

    /// Close the mailbox, let an in-flight delivery finish and drop the timer.
    ///
    /// Records already in the mailbox are appended so they persist with the
    /// rest of the backlog for the next start. Returns the acks of any other
    /// shutdown requests found there.
    async fn stop(&mut self) -> Vec<oneshot::Sender<()>> {
        self.rx.close();
        self.cancel_idle_timer();
        if let Some(flight) = self.in_flight.as_mut() {
            let outcome = (&mut flight.task).await;
            self.settle(outcome);
        }

        let mut acks = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BufferMessage::Record(record) => {
                    self.queue.append(record);
                    self.stats.recorded += 1;
                }
                BufferMessage::Shutdown { response_tx } => acks.push(response_tx),
                // Dropped reply channels report `BufferError::Closed`
                _ => {}
            }
        }

        info!("Action buffer stopped with {} actions pending", self.queue.size());
        acks
    }

    fn state(&self) -> FlushState {
        if self.in_flight.is_some() {
            debug_assert!(self.idle_timer.is_none(), "No timer while flushing");
            FlushState::Flushing
        } else if self.idle_timer.is_some() {
            FlushState::Scheduled
        } else {
            FlushState::Idle
        }
    }

    fn stats(&self) -> BufferStats {
        BufferStats {
            persist_failures: self.queue.persist_failures(),
            ..self.stats.clone()
        }
    }
}

async fn delivery_settled(in_flight: &mut Option<InFlight>) -> DeliveryOutcome {
    match in_flight {
        Some(flight) => (&mut flight.task).await,
        None => std::future::pending().await,
    }
}

async fn idle_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{spawn_action_buffer, FlushState};
    use crate::config::BufferConfig;
    use crate::record::ActionInput;
    use crate::store::InMemoryActionStore;
    use crate::transport::InMemoryTransport;
    use std::time::Duration;

    const IDLE: Duration = Duration::from_secs(60);

    fn config() -> BufferConfig {
        BufferConfig::default()
            .with_idle_timeout(IDLE)
            .with_flush_threshold(10)
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let transport = InMemoryTransport::new();
        let (buffer, task) =
            spawn_action_buffer(InMemoryActionStore::new(), transport.clone(), &config());

        assert_eq!(buffer.state().await.unwrap(), FlushState::Idle);

        buffer.record(ActionInput::click()).unwrap();
        assert_eq!(buffer.state().await.unwrap(), FlushState::Scheduled);

        tokio::time::sleep(IDLE + Duration::from_millis(1)).await;
        assert_eq!(buffer.state().await.unwrap(), FlushState::Idle);
        assert_eq!(transport.batch_count(), 1);

        buffer.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_on_empty_queue_is_noop() {
        let transport = InMemoryTransport::new();
        let (buffer, task) =
            spawn_action_buffer(InMemoryActionStore::new(), transport.clone(), &config());

        buffer.flush().unwrap();
        let stats = buffer.stats().await.unwrap();
        assert_eq!(stats.empty_flushes, 1);
        assert_eq!(stats.flushes_started, 0);
        assert_eq!(transport.attempts(), 0);
        assert_eq!(buffer.state().await.unwrap(), FlushState::Idle);

        buffer.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_ships_partial_batch() {
        let transport = InMemoryTransport::new();
        let (buffer, task) =
            spawn_action_buffer(InMemoryActionStore::new(), transport.clone(), &config());

        for _ in 0..3 {
            buffer.record(ActionInput::click()).unwrap();
        }
        buffer.flush().unwrap();
        let stats = buffer.stats().await.unwrap();
        assert_eq!(stats.flushes_started, 1);

        buffer.shutdown().await;
        task.await.unwrap();
        assert_eq!(transport.delivered().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_all_handles_stops_actor() {
        let (buffer, task) = spawn_action_buffer(
            InMemoryActionStore::new(),
            InMemoryTransport::new(),
            &config(),
        );
        buffer.record(ActionInput::click()).unwrap();
        drop(buffer);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_buffer_rejects_records() {
        let (buffer, task) = spawn_action_buffer(
            InMemoryActionStore::new(),
            InMemoryTransport::new(),
            &config(),
        );
        buffer.shutdown().await;
        task.await.unwrap();

        assert!(buffer.is_closed());
        assert_eq!(
            buffer.record(ActionInput::click()),
            Err(crate::record::RecordError::Closed)
        );
        assert!(buffer.size().await.is_err());
    }
}
