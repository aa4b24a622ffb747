//! Wall-clock Abstraction
//!
//! Action timestamps are epoch seconds taken when a producer records an
//! event. Going through a trait lets tests pin them.
//!
//! The idle timer does not use this clock; it runs on tokio time, which
//! tests pause and advance on their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Clock trait for action timestamps
///
/// Implementations:
/// - `SystemClock`: Uses real system time
/// - `SimulatedClock`: Uses controlled virtual time
pub trait ActionClock: Send + Sync + Clone + 'static {
    /// Current time in epoch milliseconds
    fn now_millis(&self) -> u64;

    /// Current time in epoch seconds
    fn now_secs(&self) -> u64 {
        self.now_millis() / 1000
    }
}

/// Production clock using real system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ActionClock for SystemClock {
    fn now_millis(&self) -> u64 {
        // A clock set before 1970 reports the epoch rather than panicking
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances when explicitly told to via `advance()` or `set()`.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    time_ms: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    /// Create a new simulated clock starting at the given epoch millisecond
    pub fn new(start_ms: u64) -> Self {
        SimulatedClock {
            time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn from_secs(start_secs: u64) -> Self {
        Self::new(start_secs.saturating_mul(1000))
    }

    pub fn advance(&self, duration: Duration) {
        self.time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl ActionClock for SimulatedClock {
    fn now_millis(&self) -> u64 {
        self.time_ms.load(Ordering::SeqCst)
    }
}
