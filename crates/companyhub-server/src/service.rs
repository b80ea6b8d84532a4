//! Company service: read-through caching and mutation announcements.
//!
//! Reads consult the [`LocalCache`] first and fall back to the store.
//! Writes always go to the store; the cache and the event log are updated
//! after the store has accepted the change. Event log failures never fail
//! a request, they are logged and counted.

use std::sync::Arc;

use companyhub_core::{CompanyRecord, CoreError, MutationEvent, validate_company_name};
use companyhub_storage::{DynCompanyStorage, StorageError};
use tracing::{debug, error};
use uuid::Uuid;

use crate::cache::LocalCache;
use crate::events::EventProducer;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Storage(e) if e.is_not_found())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct CompanyService {
    store: DynCompanyStorage,
    cache: Arc<LocalCache>,
    producer: EventProducer,
    publish_mutations: bool,
}

impl CompanyService {
    pub fn new(
        store: DynCompanyStorage,
        cache: Arc<LocalCache>,
        producer: EventProducer,
        publish_mutations: bool,
    ) -> Self {
        Self {
            store,
            cache,
            producer,
            publish_mutations,
        }
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub fn store(&self) -> &DynCompanyStorage {
        &self.store
    }

    /// Returns the company, serving hits from the local cache.
    ///
    /// A miss reads the store. A found record is cached locally and
    /// re-announced as an UPDATE so that other replicas pick it up too.
    pub async fn get_by_id(&self, id: Uuid) -> ServiceResult<Option<CompanyRecord>> {
        if let Some(hit) = self.cache.get(&id) {
            debug!(company_id = %id, "company served from cache");
            return Ok(Some(CompanyRecord::clone(&hit)));
        }

        let Some(record) = self.store.read(id).await? else {
            return Ok(None);
        };

        self.cache.upsert(record.id, record.name.as_str());
        self.announce(MutationEvent::update(record.id, record.name.as_str()))
            .await;
        Ok(Some(record))
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<CompanyRecord>> {
        Ok(self.store.list().await?)
    }

    pub async fn create(&self, name: &str) -> ServiceResult<Uuid> {
        validate_company_name(name)?;
        let id = self.store.create(name).await?;
        debug!(company_id = %id, "company created");
        Ok(id)
    }

    /// Renames a company in the store.
    ///
    /// With mutation publishing on, the local entry is dropped and an
    /// UPDATE is announced after the store commit.
    pub async fn update(&self, id: Uuid, name: &str) -> ServiceResult<()> {
        validate_company_name(name)?;
        self.store.update(id, name).await?;

        if self.publish_mutations {
            self.cache.remove(&id);
            self.announce(MutationEvent::update(id, name)).await;
        }
        Ok(())
    }

    /// Deletes a company.
    ///
    /// The local entry goes first so this replica never serves a row the
    /// store is about to drop. The DELETE is announced after the commit.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.cache.remove(&id);
        self.store.delete(id).await?;

        if self.publish_mutations {
            self.announce(MutationEvent::delete(id)).await;
        }
        Ok(())
    }

    async fn announce(&self, event: MutationEvent) {
        if let Err(e) = self.producer.publish_event(&event).await {
            error!(
                company_id = %event.id,
                action = %event.action,
                error = %e,
                "failed to publish company event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventLog;
    use companyhub_core::MutationAction;
    use companyhub_db_memory::InMemoryStorage;
    use companyhub_storage::CompanyStorage;

    struct Fixture {
        store: Arc<InMemoryStorage>,
        log: Arc<InMemoryEventLog>,
        service: CompanyService,
    }

    fn fixture(publish_mutations: bool) -> Fixture {
        let store = Arc::new(InMemoryStorage::new());
        let log = Arc::new(InMemoryEventLog::new());
        let service = CompanyService::new(
            store.clone(),
            Arc::new(LocalCache::new()),
            EventProducer::new(log.clone()),
            publish_mutations,
        );
        Fixture {
            store,
            log,
            service,
        }
    }

    #[tokio::test]
    async fn miss_reads_store_caches_and_announces() {
        let f = fixture(true);
        let id = f.service.create("Acme").await.unwrap();

        let record = f.service.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record, CompanyRecord::new(id, "Acme"));
        assert_eq!(f.store.company_reads(), 1);
        assert!(f.service.cache().contains(&id));

        let entries = f.log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decode().unwrap(), MutationEvent::update(id, "Acme"));

        // second read is a hit: no store I/O, no new event
        let again = f.service.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(again, record);
        assert_eq!(f.store.company_reads(), 1);
        assert_eq!(f.log.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_id_is_none_and_not_cached() {
        let f = fixture(true);
        let id = Uuid::new_v4();

        assert!(f.service.get_by_id(id).await.unwrap().is_none());
        assert!(!f.service.cache().contains(&id));
        assert!(f.log.is_empty().await);
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_the_read() {
        let f = fixture(true);
        let id = f.service.create("Acme").await.unwrap();
        f.log.set_unavailable(true);

        let record = f.service.get_by_id(id).await.unwrap();
        assert_eq!(record.map(|r| r.name), Some("Acme".to_string()));
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_writes() {
        let f = fixture(true);
        let id = f.service.create("Acme").await.unwrap();
        f.service.get_by_id(id).await.unwrap();
        f.log.set_unavailable(true);

        f.service.update(id, "Acme Corp").await.unwrap();
        assert!(!f.service.cache().contains(&id));
        assert_eq!(f.store.read(id).await.unwrap().unwrap().name, "Acme Corp");

        f.service.delete(id).await.unwrap();
        assert!(f.store.read(id).await.unwrap().is_none());
        assert_eq!(f.store.company_count(), 0);

        // only the read-through announcement made it into the log
        f.log.set_unavailable(false);
        assert_eq!(f.log.len().await, 1);
    }

    #[tokio::test]
    async fn update_invalidates_and_announces_when_publishing() {
        let f = fixture(true);
        let id = f.service.create("Acme").await.unwrap();
        f.service.get_by_id(id).await.unwrap();

        f.service.update(id, "Acme Corp").await.unwrap();
        assert!(!f.service.cache().contains(&id));

        let last = f.log.entries().await.pop().unwrap().decode().unwrap();
        assert_eq!(last.action, MutationAction::Update);
        assert_eq!(last.name, "Acme Corp");
    }

    #[tokio::test]
    async fn update_leaves_cache_alone_when_not_publishing() {
        let f = fixture(false);
        let id = f.service.create("Acme").await.unwrap();
        f.service.get_by_id(id).await.unwrap();
        let before = f.log.len().await;

        f.service.update(id, "Acme Corp").await.unwrap();
        assert_eq!(f.service.cache().peek(&id).unwrap().name, "Acme");
        assert_eq!(f.log.len().await, before);
    }

    #[tokio::test]
    async fn delete_removes_locally_then_from_store() {
        let f = fixture(false);
        let id = f.service.create("Acme").await.unwrap();
        f.service.get_by_id(id).await.unwrap();
        let before = f.log.len().await;

        f.service.delete(id).await.unwrap();
        assert!(!f.service.cache().contains(&id));
        assert!(f.service.get_by_id(id).await.unwrap().is_none());
        assert_eq!(f.log.len().await, before);
    }

    #[tokio::test]
    async fn delete_announces_when_publishing() {
        let f = fixture(true);
        let id = f.service.create("Acme").await.unwrap();

        f.service.delete(id).await.unwrap();
        let last = f.log.entries().await.pop().unwrap().decode().unwrap();
        assert_eq!(last, MutationEvent::delete(id));
    }

    #[tokio::test]
    async fn store_errors_are_definitive() {
        let f = fixture(true);
        let missing = Uuid::new_v4();

        let err = f.service.update(missing, "Nope").await.unwrap_err();
        assert!(err.is_not_found());
        let err = f.service.delete(missing).await.unwrap_err();
        assert!(err.is_not_found());
        // nothing is announced for a failed write
        assert!(f.log.is_empty().await);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_the_store() {
        let f = fixture(true);
        assert!(matches!(
            f.service.create("   ").await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(f.store.company_count(), 0);
    }
}
