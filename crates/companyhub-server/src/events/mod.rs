//! Cross-replica cache coherence through a shared, ordered event log.
//!
//! Every replica appends one event per company mutation through the
//! [`EventProducer`] and runs a single [`EventConsumer`] that tails the log
//! and folds each event into its [`LocalCache`](crate::cache::LocalCache).
//!
//! Two log backends are provided:
//! - [`RedisStreamLog`] - Redis Streams (`XADD` / `XREAD BLOCK`)
//! - [`InMemoryEventLog`] - a process-local log for tests and single-instance runs

pub mod consumer;
pub mod memory;
pub mod producer;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use companyhub_core::{Cursor, LogEntry, MutationEvent, StartPosition};

pub use consumer::{ConsumerHandle, ConsumerSettings, EventConsumer};
pub use memory::InMemoryEventLog;
pub use producer::EventProducer;
pub use redis::{RedisStreamLog, create_redis_pool};

/// Errors raised by event log backends.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Event log pool error: {0}")]
    Pool(String),

    #[error("Event log connection error: {0}")]
    Connection(String),

    #[error("Event log command failed: {0}")]
    Command(String),

    #[error("Malformed log entry: {0}")]
    Malformed(String),

    #[error("Event log unavailable")]
    Unavailable,
}

/// Append-only, multi-reader, position-addressable log of mutation events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends one event and returns the cursor it was stored at.
    async fn append(&self, event: &MutationEvent) -> Result<Cursor, EventLogError>;

    /// Turns a start position into a concrete cursor.
    ///
    /// Entries strictly after the returned cursor are delivered to a
    /// subscription opened from it.
    async fn resolve_start(&self, start: StartPosition) -> Result<Cursor, EventLogError>;

    /// Opens a reader positioned after `from`.
    async fn subscribe(&self, from: Cursor) -> Result<Box<dyn EventSubscription>, EventLogError>;

    /// Round-trips to the backend.
    async fn ping(&self) -> Result<(), EventLogError>;

    fn backend_name(&self) -> &'static str;
}

/// A positioned reader over an [`EventLog`].
#[async_trait]
pub trait EventSubscription: Send {
    /// Returns up to `max` entries after the current position, waiting at
    /// most `block` for the first one. A timeout yields an empty batch.
    ///
    /// Entries are returned in log order and the position advances past
    /// the last returned entry.
    async fn next_batch(
        &mut self,
        max: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, EventLogError>;

    /// Position after which the next batch starts.
    fn position(&self) -> Cursor;
}
