//! Process-local event log.
//!
//! Shares the [`EventLog`] contract with the Redis backend: entries are
//! totally ordered, readers block without spinning and several replicas
//! (several `AppState`s in one process) can tail the same log. An outage
//! switch lets tests exercise the consumer's reconnect path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use companyhub_core::{Cursor, LogEntry, MutationEvent, RawEvent, StartPosition};
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

use super::{EventLog, EventLogError, EventSubscription};

#[derive(Default)]
struct Shared {
    entries: RwLock<Vec<LogEntry>>,
    appended: Notify,
    unavailable: AtomicBool,
}

impl Shared {
    fn check_available(&self) -> Result<(), EventLogError> {
        if self.unavailable.load(Ordering::Acquire) {
            Err(EventLogError::Unavailable)
        } else {
            Ok(())
        }
    }
}

/// In-memory [`EventLog`]. Cloning yields another handle to the same log.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    shared: Arc<Shared>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw fields without validating them.
    pub async fn append_raw(&self, event: RawEvent) -> Result<Cursor, EventLogError> {
        self.shared.check_available()?;
        let cursor = {
            let mut entries = self.shared.entries.write().await;
            let cursor = Cursor::new(0, entries.len() as u64 + 1);
            entries.push(LogEntry::new(cursor, event));
            cursor
        };
        self.shared.appended.notify_waiters();
        Ok(cursor)
    }

    /// Simulates losing (or regaining) the connection to the log.
    ///
    /// While unavailable every operation fails with
    /// [`EventLogError::Unavailable`] and blocked readers are woken up.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::Release);
        self.shared.appended.notify_waiters();
    }

    pub async fn entries(&self) -> Vec<LogEntry> {
        self.shared.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.shared.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn tail(&self) -> Cursor {
        self.shared
            .entries
            .read()
            .await
            .last()
            .map_or(Cursor::ZERO, |entry| entry.cursor)
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: &MutationEvent) -> Result<Cursor, EventLogError> {
        self.append_raw(RawEvent::from(event)).await
    }

    async fn resolve_start(&self, start: StartPosition) -> Result<Cursor, EventLogError> {
        self.shared.check_available()?;
        Ok(match start {
            StartPosition::Latest => self.tail().await,
            StartPosition::Beginning => Cursor::ZERO,
            StartPosition::After(cursor) => cursor,
        })
    }

    async fn subscribe(&self, from: Cursor) -> Result<Box<dyn EventSubscription>, EventLogError> {
        self.shared.check_available()?;
        Ok(Box::new(InMemorySubscription {
            shared: Arc::clone(&self.shared),
            position: from,
        }))
    }

    async fn ping(&self) -> Result<(), EventLogError> {
        self.shared.check_available()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct InMemorySubscription {
    shared: Arc<Shared>,
    position: Cursor,
}

#[async_trait]
impl EventSubscription for InMemorySubscription {
    async fn next_batch(
        &mut self,
        max: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, EventLogError> {
        let deadline = Instant::now() + block;
        loop {
            // Register interest before looking, so an append that lands
            // between the check and the wait still wakes us.
            let notified = self.shared.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.shared.check_available()?;
            {
                let entries = self.shared.entries.read().await;
                let start = entries.partition_point(|entry| entry.cursor <= self.position);
                if start < entries.len() {
                    let batch: Vec<LogEntry> =
                        entries[start..].iter().take(max.max(1)).cloned().collect();
                    if let Some(last) = batch.last() {
                        self.position = last.cursor;
                    }
                    return Ok(batch);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    fn position(&self) -> Cursor {
        self.position
    }
}
