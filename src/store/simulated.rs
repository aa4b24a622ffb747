//! Simulated Action Store with Fault Injection
//!
//! Wraps another store and fails loads/saves with seeded probabilities, so
//! a failing run can be replayed exactly from its seed.

use super::{ActionStore, StoreError};
use crate::record::ActionRecord;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of a save failing (snapshot left untouched)
    pub save_fail_prob: f64,
    /// Probability of a load failing
    pub load_fail_prob: f64,
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            save_fail_prob: 0.05,
            load_fail_prob: 0.01,
        }
    }
}

impl SimulatedStoreConfig {
    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            save_fail_prob: 0.0,
            load_fail_prob: 0.0,
        }
    }

    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            save_fail_prob: 0.3,
            load_fail_prob: 0.1,
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedStoreStats {
    pub save_attempts: u64,
    pub save_failures: u64,
    pub load_attempts: u64,
    pub load_failures: u64,
}

struct SimulatedStoreInner {
    rng: ChaCha8Rng,
    stats: SimulatedStoreStats,
}

/// Store wrapper that injects seeded failures
pub struct SimulatedActionStore<S: ActionStore> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: Arc<Mutex<SimulatedStoreInner>>,
}

impl<S: ActionStore> SimulatedActionStore<S> {
    pub fn new(inner_store: S, seed: u64, config: SimulatedStoreConfig) -> Self {
        SimulatedActionStore {
            inner_store,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng: ChaCha8Rng::seed_from_u64(seed),
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    /// Get the wrapped store (to inspect what actually got persisted)
    pub fn inner_store(&self) -> &S {
        &self.inner_store
    }
}

impl<S: ActionStore + Clone> Clone for SimulatedActionStore<S> {
    fn clone(&self) -> Self {
        SimulatedActionStore {
            inner_store: self.inner_store.clone(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: ActionStore> ActionStore for SimulatedActionStore<S> {
    fn load(&self) -> Result<Vec<ActionRecord>, StoreError> {
        {
            let mut s = self.state.lock();
            s.stats.load_attempts += 1;
            let prob = self.config.load_fail_prob;
            if prob > 0.0 && s.rng.gen_bool(prob) {
                s.stats.load_failures += 1;
                return Err(StoreError::Injected("load"));
            }
        }
        self.inner_store.load()
    }

    fn save(&self, records: &[ActionRecord]) -> Result<(), StoreError> {
        {
            let mut s = self.state.lock();
            s.stats.save_attempts += 1;
            let prob = self.config.save_fail_prob;
            if prob > 0.0 && s.rng.gen_bool(prob) {
                s.stats.save_failures += 1;
                return Err(StoreError::Injected("save"));
            }
        }
        self.inner_store.save(records)
    }
}
