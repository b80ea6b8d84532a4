//! Background task that tails the event log into the local cache.
//!
//! The consumer resolves its start cursor and opens the first subscription
//! before it is spawned, so a log that is unreachable at startup fails the
//! process instead of a detached task. Once running, only cancellation
//! stops it: read errors back off exponentially and resubscribe from the
//! last applied cursor.

use std::sync::Arc;
use std::time::Duration;

use companyhub_core::{Cursor, LogEntry, MutationEvent, StartPosition};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EventLog, EventLogError, EventSubscription};
use crate::config::ConsumerConfig;
use crate::metrics;

/// Tuning for one consumer loop.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    pub start: StartPosition,
    pub batch_size: usize,
    pub block: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from(&ConsumerConfig::default())
    }
}

impl From<&ConsumerConfig> for ConsumerSettings {
    fn from(config: &ConsumerConfig) -> Self {
        Self {
            start: config.start.into(),
            batch_size: config.batch_size,
            block: Duration::from_millis(config.block_ms),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

/// Tails an [`EventLog`] and hands every decoded event to an apply callback.
pub struct EventConsumer {
    log: Arc<dyn EventLog>,
    settings: ConsumerSettings,
}

impl EventConsumer {
    pub fn new(log: Arc<dyn EventLog>, settings: ConsumerSettings) -> Self {
        Self { log, settings }
    }

    /// Subscribes and spawns the consumer loop.
    ///
    /// # Errors
    ///
    /// Returns the log error if the start cursor cannot be resolved or the
    /// first subscription cannot be opened. Nothing is spawned in that case.
    pub async fn spawn<F>(
        self,
        cancel: CancellationToken,
        apply: F,
    ) -> Result<ConsumerHandle, EventLogError>
    where
        F: Fn(&MutationEvent) + Send + Sync + 'static,
    {
        let start = self.log.resolve_start(self.settings.start).await?;
        let subscription = self.log.subscribe(start).await?;
        let (progress_tx, progress_rx) = watch::channel(start);

        info!(
            backend = self.log.backend_name(),
            cursor = %start,
            "starting event consumer"
        );

        let task = tokio::spawn(self.run(subscription, start, cancel.clone(), apply, progress_tx));

        Ok(ConsumerHandle {
            cancel,
            progress: progress_rx,
            task,
        })
    }

    async fn run<F>(
        self,
        subscription: Box<dyn EventSubscription>,
        start: Cursor,
        cancel: CancellationToken,
        apply: F,
        progress: watch::Sender<Cursor>,
    ) where
        F: Fn(&MutationEvent) + Send + Sync + 'static,
    {
        let mut cursor = start;
        let mut backoff = self.settings.backoff_initial;
        let mut subscription = Some(subscription);

        loop {
            if subscription.is_none() {
                let reconnect = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = self.log.subscribe(cursor) => result,
                };
                match reconnect {
                    Ok(sub) => {
                        info!(cursor = %cursor, "event log subscription re-established");
                        backoff = self.settings.backoff_initial;
                        subscription = Some(sub);
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            cursor = %cursor,
                            retry_in_ms = backoff.as_millis() as u64,
                            "failed to resubscribe to event log"
                        );
                        metrics::record_consumer_reconnect();
                        if !sleep_or_cancel(&cancel, backoff).await {
                            break;
                        }
                        backoff = next_backoff(backoff, self.settings.backoff_max);
                        continue;
                    }
                }
            }
            let Some(sub) = subscription.as_mut() else {
                continue;
            };

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = sub.next_batch(self.settings.batch_size, self.settings.block) => result,
            };

            match batch {
                Ok(entries) => {
                    backoff = self.settings.backoff_initial;
                    let before = cursor;
                    for entry in &entries {
                        // Redelivery after a reconnect must not move the cache backwards.
                        if entry.cursor <= cursor {
                            continue;
                        }
                        apply_entry(entry, &apply);
                        cursor = entry.cursor;
                    }
                    if cursor != before {
                        progress.send_replace(cursor);
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        cursor = %cursor,
                        retry_in_ms = backoff.as_millis() as u64,
                        "event log read failed, reconnecting"
                    );
                    metrics::record_consumer_reconnect();
                    subscription = None;
                    if !sleep_or_cancel(&cancel, backoff).await {
                        break;
                    }
                    backoff = next_backoff(backoff, self.settings.backoff_max);
                }
            }
        }

        info!(cursor = %cursor, "event consumer stopped");
    }
}

fn apply_entry<F>(entry: &LogEntry, apply: &F)
where
    F: Fn(&MutationEvent),
{
    match entry.decode() {
        Ok(event) => {
            apply(&event);
            metrics::record_event_applied(event.action.as_str());
            debug!(
                cursor = %entry.cursor,
                company_id = %event.id,
                action = %event.action,
                "applied company event"
            );
        }
        Err(e) => {
            metrics::record_event_skipped();
            warn!(
                cursor = %entry.cursor,
                error = %e,
                "skipping undecodable event"
            );
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Sleeps for `delay`; returns `false` if cancelled first.
async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Owner's view of a running consumer.
pub struct ConsumerHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<Cursor>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Cursor of the last entry the loop consumed (applied or skipped).
    pub fn last_applied(&self) -> Cursor {
        *self.progress.borrow()
    }

    pub fn progress(&self) -> watch::Receiver<Cursor> {
        self.progress.clone()
    }

    /// Waits until the consumer has moved past `target`.
    ///
    /// Returns `false` on timeout or if the consumer stopped first.
    pub async fn wait_for(&self, target: Cursor, timeout: Duration) -> bool {
        let mut progress = self.progress.clone();
        matches!(
            tokio::time::timeout(timeout, progress.wait_for(|cursor| *cursor >= target)).await,
            Ok(Ok(_))
        )
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "event consumer task ended abnormally");
        }
    }
}
