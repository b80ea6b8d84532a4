use std::sync::Arc;

use companyhub_core::{Cursor, MutationAction, MutationEvent};
use tracing::debug;
use uuid::Uuid;

use super::{EventLog, EventLogError};
use crate::metrics;

/// Appends company mutations to the shared log.
///
/// Appends from one producer land in the log in call order. Failures are
/// returned to the caller, which decides whether they matter.
#[derive(Clone)]
pub struct EventProducer {
    log: Arc<dyn EventLog>,
}

impl EventProducer {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log }
    }

    pub async fn publish(
        &self,
        id: Uuid,
        action: MutationAction,
        name: &str,
    ) -> Result<Cursor, EventLogError> {
        let event = MutationEvent {
            id,
            action,
            name: name.to_string(),
        };
        self.publish_event(&event).await
    }

    pub async fn publish_event(&self, event: &MutationEvent) -> Result<Cursor, EventLogError> {
        match self.log.append(event).await {
            Ok(cursor) => {
                metrics::record_event_published(event.action.as_str());
                debug!(
                    company_id = %event.id,
                    action = %event.action,
                    cursor = %cursor,
                    "published company event"
                );
                Ok(cursor)
            }
            Err(e) => {
                metrics::record_event_publish_failure(event.action.as_str());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventLog;

    #[tokio::test]
    async fn publish_order_is_log_order() {
        let log = Arc::new(InMemoryEventLog::new());
        let producer = EventProducer::new(log.clone());
        let id = Uuid::new_v4();

        let first = producer
            .publish(id, MutationAction::Update, "Acme")
            .await
            .unwrap();
        let second = producer
            .publish(id, MutationAction::Delete, "")
            .await
            .unwrap();
        assert!(first < second);

        let entries = log.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].decode().unwrap(), MutationEvent::update(id, "Acme"));
        assert_eq!(entries[1].decode().unwrap(), MutationEvent::delete(id));
    }

    #[tokio::test]
    async fn publish_surfaces_backend_failure() {
        let log = Arc::new(InMemoryEventLog::new());
        log.set_unavailable(true);
        let producer = EventProducer::new(log.clone());

        let result = producer
            .publish(Uuid::new_v4(), MutationAction::Update, "Acme")
            .await;
        assert!(matches!(result, Err(EventLogError::Unavailable)));
        assert_eq!(log.len().await, 0);
    }
}
