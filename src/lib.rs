pub mod buffer;
pub mod clock;
pub mod config;
pub mod observability;
pub mod queue;
pub mod record;
pub mod store;
pub mod transport;

pub use buffer::{
    spawn_action_buffer, spawn_action_buffer_with_clock, ActionBuffer, BufferError, BufferStats,
    FlushState, FlushTrigger,
};
pub use config::BufferConfig;
pub use queue::PersistentQueue;
pub use record::{ActionBatch, ActionInput, ActionRecord, ActionResult, ExtraValue, RecordError};
pub use store::{ActionStore, InMemoryActionStore, LocalActionStore, StoreError};
pub use transport::{InMemoryTransport, Transport, TransportError};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
