//! Batch Delivery
//!
//! A transport ships one drained batch to the ingestion endpoint. The
//! buffer treats delivery as fire-and-forget: the outcome is logged and
//! counted, and a failed batch is never re-enqueued.
//!
//! Implementations:
//! - `HttpTransport`: JSON POST via reqwest (feature `http`)
//! - `InMemoryTransport`: Captures batches for tests

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;

use crate::record::{ActionBatch, ActionRecord};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Error type for batch delivery
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode action batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("delivery request failed: {0}")]
    Request(String),
    #[error("ingestion endpoint responded with status {0}")]
    Status(u16),
}

pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Delivers `{"actions": [...]}` payloads
pub trait Transport: Send + Sync + 'static {
    fn deliver<'a>(&'a self, batch: &'a ActionBatch) -> DeliveryFuture<'a>;
}

// ============================================================================
// InMemoryTransport - For tests
// ============================================================================

#[derive(Debug, Default)]
struct InMemoryTransportState {
    batches: Vec<ActionBatch>,
    attempts: u64,
    failing: bool,
}

/// Transport that keeps every successfully delivered batch in memory.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<InMemoryTransportState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// While failing, deliveries return a 503 and nothing is captured.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    pub fn batches(&self) -> Vec<ActionBatch> {
        self.state.lock().batches.clone()
    }

    pub fn batch_count(&self) -> usize {
        self.state.lock().batches.len()
    }

    /// All delivered records, flattened in delivery order
    pub fn delivered(&self) -> Vec<ActionRecord> {
        self.state
            .lock()
            .batches
            .iter()
            .flat_map(|batch| batch.actions().iter().cloned())
            .collect()
    }

    /// Deliveries attempted, including failed ones
    pub fn attempts(&self) -> u64 {
        self.state.lock().attempts
    }
}

impl Transport for InMemoryTransport {
    fn deliver<'a>(&'a self, batch: &'a ActionBatch) -> DeliveryFuture<'a> {
        let result = {
            let mut state = self.state.lock();
            state.attempts += 1;
            if state.failing {
                Err(TransportError::Status(503))
            } else {
                state.batches.push(batch.clone());
                Ok(())
            }
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ActionInput;

    fn batch(n: usize) -> ActionBatch {
        ActionBatch::new(
            (0..n)
                .map(|_| ActionInput::click().normalize(1).unwrap())
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_captures_batches() {
        let transport = InMemoryTransport::new();
        transport.deliver(&batch(2)).await.unwrap();
        transport.deliver(&batch(3)).await.unwrap();

        assert_eq!(transport.batch_count(), 2);
        assert_eq!(transport.delivered().len(), 5);
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_failing_mode() {
        let transport = InMemoryTransport::new();
        transport.set_failing(true);
        let err = transport.deliver(&batch(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Status(503)));
        assert_eq!(transport.batch_count(), 0);
        assert_eq!(transport.attempts(), 1);

        transport.set_failing(false);
        transport.deliver(&batch(1)).await.unwrap();
        assert_eq!(transport.batch_count(), 1);
    }
}
