//! Action Relay
//!
//! Reads flat JSON action objects from stdin, one per line, and ships them
//! to the ingestion endpoint through an action buffer:
//!
//! ```text
//! {"category":"routeChange","route":"novels","path":"/novels","result":0}
//! {"category":"login","result":1,"account":"treexie"}
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | ACTION_BUFFER_CONFIG | - | TOML config file (first CLI argument wins) |
//! | ACTION_BUFFER_IDLE_MS | 60000 | Quiet period before a flush |
//! | ACTION_BUFFER_THRESHOLD | 10 | Queue size that flushes immediately |
//! | ACTION_BUFFER_ENDPOINT | http://127.0.0.1:7001/users/v1/actions | Ingestion URL |
//! | ACTION_BUFFER_STORE | - | Queue snapshot file |
//! | ACTION_BUFFER_DELIVERY_TIMEOUT_MS | 10000 | HTTP request timeout |
//! | RUST_LOG | info | Log filter |
//! | ACTION_BUFFER_LOG_JSON | false | JSON log lines |

use action_buffer::observability::{init_tracing, LogConfig};
use action_buffer::{
    spawn_action_buffer, ActionBuffer, ActionStore, BufferConfig, HttpTransport,
    InMemoryActionStore, LocalActionStore,
};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing(&LogConfig::from_env())?;

    let config = load_config()?;
    let transport = HttpTransport::from_config(&config)?;
    let store: Box<dyn ActionStore> = match &config.store_path {
        Some(path) => Box::new(LocalActionStore::new(path)?),
        None => Box::new(InMemoryActionStore::new()),
    };

    info!(
        "Relaying actions to {} (idle {}ms, threshold {})",
        config.endpoint,
        config.idle_timeout.as_millis(),
        config.flush_threshold
    );
    let (buffer, task) = spawn_action_buffer(store, transport, &config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => relay_line(&buffer, &line),
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    // Ship the tail before exiting; anything undelivered stays in the store
    buffer.flush()?;
    buffer.shutdown().await;
    task.await?;

    Ok(())
}

fn load_config() -> Result<BufferConfig, BoxError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ACTION_BUFFER_CONFIG").ok())
        .map(PathBuf::from);

    let config = match path {
        Some(path) => BufferConfig::load(&path)?.with_env_overrides()?,
        None => BufferConfig::from_env()?,
    };
    Ok(config)
}

fn relay_line(buffer: &ActionBuffer, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let object = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            warn!("Skipping non-object action: {}", line);
            return;
        }
        Err(e) => {
            warn!("Skipping malformed action ({}): {}", e, line);
            return;
        }
    };

    if let Err(e) = buffer.record_flat(object) {
        warn!("Rejected action: {}", e);
    }
}
