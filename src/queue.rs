//! Persistent Queue
//!
//! FIFO of action records mirrored to an [`ActionStore`]. Every append writes
//! the whole queue through; a drain hands back the contents and clears the
//! store in one `&mut self` call, so no append can land between the two.
//!
//! Durability is best-effort: when a save fails the record still stays in
//! memory, and memory is authoritative for the rest of the session.

use crate::record::ActionRecord;
use crate::store::ActionStore;
use tracing::{info, warn};

pub struct PersistentQueue<S: ActionStore> {
    store: S,
    records: Vec<ActionRecord>,
    persist_failures: u64,
}

impl<S: ActionStore> PersistentQueue<S> {
    /// Create an empty queue over `store`. Call [`load`](Self::load) to
    /// restore a persisted backlog.
    pub fn new(store: S) -> Self {
        PersistentQueue {
            store,
            records: Vec::new(),
            persist_failures: 0,
        }
    }

    /// Replace the in-memory buffer with the persisted snapshot.
    ///
    /// Idempotent. If the store can't be read the buffer is left as it is
    /// (empty at startup). Returns the buffer size afterwards.
    pub fn load(&mut self) -> usize {
        match self.store.load() {
            Ok(records) => {
                if !records.is_empty() {
                    info!("Restored {} persisted actions", records.len());
                }
                self.records = records;
            }
            Err(e) => {
                warn!("Failed to load persisted actions, starting empty: {}", e);
            }
        }
        self.records.len()
    }

    pub fn append(&mut self, record: ActionRecord) {
        self.records.push(record);
        self.persist();
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take every queued record, in insertion order, and clear the store.
    pub fn drain(&mut self) -> Vec<ActionRecord> {
        let drained = std::mem::take(&mut self.records);
        if !drained.is_empty() {
            self.persist();
        }
        debug_assert!(self.records.is_empty(), "Postcondition: queue empty after drain");
        drained
    }

    /// Copy of the queued records, in order
    pub fn pending(&self) -> Vec<ActionRecord> {
        self.records.clone()
    }

    /// Number of saves that failed since creation
    pub fn persist_failures(&self) -> u64 {
        self.persist_failures
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.records) {
            self.persist_failures += 1;
            warn!(
                "Failed to persist {} queued actions (kept in memory): {}",
                self.records.len(),
                e
            );
        }
    }
}
