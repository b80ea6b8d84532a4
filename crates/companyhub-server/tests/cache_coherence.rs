//! Multi-replica cache coherence over a shared in-memory store and log.
//!
//! Each "replica" is a fully built server (service, cache, consumer) that
//! shares one `InMemoryStorage` and one `InMemoryEventLog` with its peers.

use std::sync::Arc;
use std::time::Duration;

use companyhub_core::{CompanyRecord, MutationAction, MutationEvent, RawEvent};
use companyhub_db_memory::InMemoryStorage;
use companyhub_server::config::{EventLogBackend, StorageBackend};
use companyhub_server::events::EventLog;
use companyhub_server::{
    AppConfig, CompanyHubServer, EventProducer, InMemoryEventLog, ServerBuilder,
};
use futures_util::future::join_all;
use uuid::Uuid;

const CATCH_UP: Duration = Duration::from_secs(5);

fn test_config(publish_mutations: bool) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.enabled = false;
    cfg.storage.backend = StorageBackend::Memory;
    cfg.event_log.backend = EventLogBackend::Memory;
    cfg.coherence.publish_mutations = publish_mutations;
    cfg.coherence.consumer.block_ms = 50;
    cfg.coherence.consumer.backoff_initial_ms = 5;
    cfg.coherence.consumer.backoff_max_ms = 50;
    cfg
}

struct Cluster {
    store: Arc<InMemoryStorage>,
    log: Arc<InMemoryEventLog>,
    replicas: Vec<CompanyHubServer>,
}

impl Cluster {
    async fn start(size: usize, publish_mutations: bool) -> Self {
        let store = Arc::new(InMemoryStorage::new());
        let log = Arc::new(InMemoryEventLog::new());
        let mut replicas = Vec::with_capacity(size);
        for _ in 0..size {
            let server = ServerBuilder::new(test_config(publish_mutations))
                .with_company_storage(store.clone())
                .with_auth_storage(store.clone(), store.clone())
                .with_event_log(log.clone())
                .build()
                .await
                .expect("build replica");
            replicas.push(server);
        }
        Self {
            store,
            log,
            replicas,
        }
    }

    fn replica(&self, index: usize) -> &CompanyHubServer {
        &self.replicas[index]
    }

    /// Waits until every replica has consumed the whole log.
    async fn settle(&self) {
        let Some(tail) = self.log.entries().await.last().map(|e| e.cursor) else {
            return;
        };
        for (i, replica) in self.replicas.iter().enumerate() {
            assert!(
                replica.consumer().wait_for(tail, CATCH_UP).await,
                "replica {i} did not catch up to {tail}"
            );
        }
    }

    async fn stop(self) {
        for replica in self.replicas {
            replica.shutdown().await;
        }
    }
}

#[tokio::test]
async fn read_through_populates_cache_and_second_read_skips_store() {
    let cluster = Cluster::start(1, true).await;
    let c1 = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(c1, "Acme"));

    let service = &cluster.replica(0).state().companies;
    assert!(!service.cache().contains(&c1));

    let first = service.get_by_id(c1).await.unwrap();
    assert_eq!(first, Some(CompanyRecord::new(c1, "Acme")));
    assert_eq!(service.cache().peek(&c1).unwrap().name, "Acme");
    assert_eq!(cluster.store.company_reads(), 1);

    let second = service.get_by_id(c1).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(cluster.store.company_reads(), 1);

    cluster.stop().await;
}

#[tokio::test]
async fn miss_on_one_replica_warms_the_others() {
    let cluster = Cluster::start(2, true).await;
    let c1 = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(c1, "Acme"));

    cluster.replica(0).state().companies.get_by_id(c1).await.unwrap();
    cluster.settle().await;

    let other = &cluster.replica(1).state().companies;
    assert_eq!(other.cache().peek(&c1).unwrap().name, "Acme");
    let reads_before = cluster.store.company_reads();
    assert!(other.get_by_id(c1).await.unwrap().is_some());
    assert_eq!(cluster.store.company_reads(), reads_before);

    cluster.stop().await;
}

#[tokio::test]
async fn delete_is_local_when_mutations_are_not_published() {
    let cluster = Cluster::start(2, false).await;
    let c1 = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(c1, "Acme"));

    let a = &cluster.replica(0).state().companies;
    let b = &cluster.replica(1).state().companies;
    a.get_by_id(c1).await.unwrap();
    b.get_by_id(c1).await.unwrap();
    cluster.settle().await;

    a.delete(c1).await.unwrap();
    assert!(!a.cache().contains(&c1));
    assert_eq!(a.get_by_id(c1).await.unwrap(), None);

    cluster.settle().await;
    // B keeps serving the stale entry until something else touches it
    assert_eq!(b.cache().peek(&c1).unwrap().name, "Acme");
    assert_eq!(cluster.store.company_count(), 0);

    cluster.stop().await;
}

#[tokio::test]
async fn delete_propagates_when_mutations_are_published() {
    let cluster = Cluster::start(3, true).await;
    let c1 = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(c1, "Acme"));

    cluster.replica(1).state().companies.get_by_id(c1).await.unwrap();
    cluster.settle().await;
    for replica in &cluster.replicas {
        assert!(replica.state().companies.cache().contains(&c1));
    }

    cluster.replica(0).state().companies.delete(c1).await.unwrap();
    cluster.settle().await;
    for replica in &cluster.replicas {
        assert!(!replica.state().companies.cache().contains(&c1));
    }

    cluster.stop().await;
}

#[tokio::test]
async fn update_propagates_new_name() {
    let cluster = Cluster::start(2, true).await;
    let c1 = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(c1, "Acme"));

    let a = &cluster.replica(0).state().companies;
    let b = &cluster.replica(1).state().companies;
    b.get_by_id(c1).await.unwrap();
    cluster.settle().await;

    a.update(c1, "Acme Corp").await.unwrap();
    cluster.settle().await;

    assert_eq!(b.cache().peek(&c1).unwrap().name, "Acme Corp");
    assert_eq!(a.cache().peek(&c1).unwrap().name, "Acme Corp");
    assert_eq!(
        b.get_by_id(c1).await.unwrap().map(|r| r.name),
        Some("Acme Corp".to_string())
    );

    cluster.stop().await;
}

#[tokio::test]
async fn later_update_wins_despite_gaps() {
    let cluster = Cluster::start(2, true).await;
    let producer = EventProducer::new(cluster.log.clone());
    let id = Uuid::new_v4();

    producer.publish(id, MutationAction::Update, "X").await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    producer.publish(id, MutationAction::Update, "Y").await.unwrap();
    cluster.settle().await;

    for replica in &cluster.replicas {
        assert_eq!(replica.state().companies.cache().peek(&id).unwrap().name, "Y");
    }

    cluster.stop().await;
}

#[tokio::test]
async fn delete_event_for_unknown_id_is_a_noop() {
    let cluster = Cluster::start(1, true).await;
    let known = Uuid::new_v4();
    let producer = EventProducer::new(cluster.log.clone());
    producer.publish(known, MutationAction::Update, "Initech").await.unwrap();
    cluster.settle().await;

    producer
        .publish(Uuid::new_v4(), MutationAction::Delete, "")
        .await
        .unwrap();
    cluster.settle().await;

    let replica = cluster.replica(0);
    assert_eq!(replica.state().companies.cache().len(), 1);
    assert!(!replica.consumer().is_finished());

    cluster.stop().await;
}

#[tokio::test]
async fn undecodable_entries_are_skipped() {
    let cluster = Cluster::start(1, true).await;
    let id = Uuid::new_v4();

    cluster
        .log
        .append_raw(RawEvent {
            id: "garbage".into(),
            action: "UPDATE".into(),
            name: "x".into(),
        })
        .await
        .unwrap();
    cluster
        .log
        .append_raw(RawEvent {
            id: id.to_string(),
            action: "MERGE".into(),
            name: "x".into(),
        })
        .await
        .unwrap();
    cluster
        .log
        .append(&MutationEvent::update(id, "Globex"))
        .await
        .unwrap();
    cluster.settle().await;

    let cache = cluster.replica(0).state().companies.cache();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.peek(&id).unwrap().name, "Globex");

    cluster.stop().await;
}

#[tokio::test]
async fn consumer_catches_up_after_log_outage() {
    let cluster = Cluster::start(2, true).await;
    let c1 = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(c1, "Acme"));

    cluster.log.set_unavailable(true);
    // publish fails, the read itself still succeeds
    let record = cluster.replica(0).state().companies.get_by_id(c1).await.unwrap();
    assert_eq!(record.map(|r| r.name), Some("Acme".to_string()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    cluster.log.set_unavailable(false);

    cluster.replica(0).state().companies.update(c1, "Acme Corp").await.unwrap();
    cluster.settle().await;

    assert_eq!(
        cluster.replica(1).state().companies.cache().peek(&c1).unwrap().name,
        "Acme Corp"
    );
    for replica in &cluster.replicas {
        assert!(!replica.consumer().is_finished());
    }

    cluster.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_and_writes_never_tear_records() {
    let cluster = Cluster::start(2, true).await;
    let id = Uuid::new_v4();
    cluster.store.seed(CompanyRecord::new(id, "name-0"));

    let tasks = (0..64).map(|i| {
        let service = Arc::clone(&cluster.replica(i % 2).state().companies);
        let store = cluster.store.clone();
        tokio::spawn(async move {
            match i % 4 {
                0 => {
                    let result = service.update(id, &format!("name-{i}")).await;
                    assert!(result.is_ok() || result.unwrap_err().is_not_found());
                }
                1 => {
                    let result = service.delete(id).await;
                    assert!(result.is_ok() || result.unwrap_err().is_not_found());
                    store.seed(CompanyRecord::new(id, format!("name-{i}")));
                }
                _ => {
                    if let Some(record) = service.get_by_id(id).await.unwrap() {
                        assert_eq!(record.id, id);
                        assert!(record.name.starts_with("name-"));
                    }
                }
            }
        })
    });

    for result in join_all(tasks).await {
        result.expect("task panicked");
    }
    cluster.settle().await;

    // after the dust settles every cached copy is a whole record
    for replica in &cluster.replicas {
        if let Some(record) = replica.state().companies.cache().peek(&id) {
            assert_eq!(record.id, id);
            assert!(record.name.starts_with("name-"));
        }
        assert!(!replica.consumer().is_finished());
    }

    cluster.stop().await;
}

#[tokio::test]
async fn failed_build_does_not_leave_a_consumer_behind() {
    let store = Arc::new(InMemoryStorage::new());
    let log = Arc::new(InMemoryEventLog::new());

    let mut cfg = test_config(true);
    cfg.auth.enabled = true;
    cfg.auth.access_token_secret = String::new();

    let result = ServerBuilder::new(cfg)
        .with_company_storage(store.clone())
        .with_auth_storage(store.clone(), store.clone())
        .with_event_log(log.clone())
        .build()
        .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(Arc::strong_count(&log), 1);
}
