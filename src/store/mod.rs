//! Action Store Abstraction
//!
//! The durable medium behind the persistent queue. A store holds one
//! snapshot of the whole queue: `save` replaces it, `load` returns it.
//!
//! ## Implementations
//!
//! - `InMemoryActionStore`: For unit tests and restart simulation
//! - `LocalActionStore`: JSON file on local disk (write + rename)
//! - `SimulatedActionStore`: Wraps another store with seeded fault injection

mod local;
mod simulated;

pub use local::LocalActionStore;
pub use simulated::{SimulatedActionStore, SimulatedStoreConfig, SimulatedStoreStats};

use crate::record::ActionRecord;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Error type for action store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("action store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("action store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("simulated {0} failure")]
    Injected(&'static str),
}

/// Trait for durable action storage
pub trait ActionStore: Send + 'static {
    /// Return the persisted snapshot; empty if nothing was ever saved.
    fn load(&self) -> Result<Vec<ActionRecord>, StoreError>;
    /// Replace the persisted snapshot. An empty slice clears it.
    fn save(&self, records: &[ActionRecord]) -> Result<(), StoreError>;
}

impl<S: ActionStore + ?Sized> ActionStore for Box<S> {
    fn load(&self) -> Result<Vec<ActionRecord>, StoreError> {
        (**self).load()
    }

    fn save(&self, records: &[ActionRecord]) -> Result<(), StoreError> {
        (**self).save(records)
    }
}

// ============================================================================
// InMemoryActionStore - For tests and restart simulation
// ============================================================================

/// In-memory store holding the serialized snapshot, the way a browser
/// key-value store would. Clones share the same snapshot, so a "restarted"
/// buffer can be built over a clone of the old one's store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActionStore {
    snapshot: Arc<Mutex<Option<String>>>,
    saves: Arc<Mutex<u64>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw persisted JSON, if any
    pub fn raw(&self) -> Option<String> {
        self.snapshot.lock().clone()
    }

    /// Overwrite the persisted JSON (for corruption tests)
    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.snapshot.lock() = Some(raw.into());
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.lock().is_none()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

impl ActionStore for InMemoryActionStore {
    fn load(&self) -> Result<Vec<ActionRecord>, StoreError> {
        match self.snapshot.lock().as_deref() {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[ActionRecord]) -> Result<(), StoreError> {
        let encoded = if records.is_empty() {
            None
        } else {
            Some(serde_json::to_string(records)?)
        };
        *self.snapshot.lock() = encoded;
        *self.saves.lock() += 1;
        Ok(())
    }
}
