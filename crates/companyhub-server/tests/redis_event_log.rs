//! Integration tests for the Redis Streams event log.
//!
//! Tests use testcontainers to spin up a real Redis instance.
//!
//! Run with: cargo test -p companyhub-server --test redis_event_log -- --ignored

use std::sync::Arc;
use std::time::Duration;

use companyhub_core::{CompanyRecord, Cursor, MutationEvent, StartPosition};
use companyhub_db_memory::InMemoryStorage;
use companyhub_server::config::{EventLogBackend, EventLogConfig, StorageBackend};
use companyhub_server::events::{EventLog, create_redis_pool};
use companyhub_server::{AppConfig, RedisConfig, RedisStreamLog, ServerBuilder};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use uuid::Uuid;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

fn redis_config(url: &str) -> RedisConfig {
    RedisConfig {
        url: url.to_string(),
        pool_size: 4,
        timeout_ms: 2000,
    }
}

/// Each test writes to its own stream so they can share the container.
fn stream_config(max_len: Option<usize>) -> EventLogConfig {
    EventLogConfig {
        backend: EventLogBackend::Redis,
        stream_key: format!("company-test-{}", Uuid::new_v4()),
        max_len,
    }
}

async fn stream_log(max_len: Option<usize>) -> RedisStreamLog {
    let url = get_redis_url().await;
    let pool = create_redis_pool(&redis_config(&url)).expect("create pool");
    RedisStreamLog::new(pool, &url, &stream_config(max_len)).expect("create log")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn appended_events_are_read_back_in_order() {
    let log = stream_log(None).await;
    log.ping().await.expect("ping");

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let first = log.append(&MutationEvent::update(a, "Acme")).await.unwrap();
    let second = log.append(&MutationEvent::delete(b)).await.unwrap();
    assert!(first < second);

    let start = log.resolve_start(StartPosition::Beginning).await.unwrap();
    assert_eq!(start, Cursor::ZERO);
    let mut sub = log.subscribe(start).await.unwrap();
    let batch = sub.next_batch(10, Duration::from_millis(100)).await.unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].cursor, first);
    assert_eq!(batch[0].decode().unwrap(), MutationEvent::update(a, "Acme"));
    assert_eq!(batch[1].decode().unwrap(), MutationEvent::delete(b));
    assert_eq!(sub.position(), second);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn latest_start_skips_history_and_blocks_for_new_entries() {
    let log = Arc::new(stream_log(None).await);
    log.append(&MutationEvent::update(Uuid::new_v4(), "old"))
        .await
        .unwrap();

    let start = log.resolve_start(StartPosition::Latest).await.unwrap();
    let mut sub = log.subscribe(start).await.unwrap();

    let empty = sub.next_batch(10, Duration::from_millis(100)).await.unwrap();
    assert!(empty.is_empty());

    let writer = Arc::clone(&log);
    let id = Uuid::new_v4();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.append(&MutationEvent::update(id, "new")).await.unwrap();
    });

    let batch = sub.next_batch(10, Duration::from_secs(5)).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].decode().unwrap(), MutationEvent::update(id, "new"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn empty_stream_latest_is_zero() {
    let log = stream_log(None).await;
    assert_eq!(
        log.resolve_start(StartPosition::Latest).await.unwrap(),
        Cursor::ZERO
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn max_len_trims_old_entries() {
    let log = stream_log(Some(10)).await;
    for i in 0..500 {
        log.append(&MutationEvent::update(Uuid::new_v4(), format!("c{i}")))
            .await
            .unwrap();
    }

    let mut sub = log.subscribe(Cursor::ZERO).await.unwrap();
    let batch = sub.next_batch(1000, Duration::from_millis(100)).await.unwrap();
    // approximate trimming keeps at least max_len and far fewer than everything
    assert!(batch.len() >= 10);
    assert!(batch.len() < 500);
    assert_eq!(batch.last().unwrap().event.name, "c499");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn replicas_share_updates_through_redis() {
    let url = get_redis_url().await;
    let store = Arc::new(InMemoryStorage::new());
    let stream = stream_config(None);

    let mut replicas = Vec::new();
    for _ in 0..2 {
        let mut cfg = AppConfig::default();
        cfg.auth.enabled = false;
        cfg.storage.backend = StorageBackend::Memory;
        cfg.redis = redis_config(&url);
        cfg.event_log = stream.clone();
        cfg.coherence.consumer.block_ms = 100;
        let server = ServerBuilder::new(cfg)
            .with_company_storage(store.clone())
            .with_auth_storage(store.clone(), store.clone())
            .build()
            .await
            .expect("build replica");
        replicas.push(server);
    }

    let c1 = Uuid::new_v4();
    store.seed(CompanyRecord::new(c1, "Acme"));
    replicas[0].state().companies.get_by_id(c1).await.unwrap();
    replicas[0].state().companies.update(c1, "Acme Corp").await.unwrap();

    let tail = replicas[0]
        .state()
        .event_log
        .resolve_start(StartPosition::Latest)
        .await
        .unwrap();
    for replica in &replicas {
        assert!(replica.consumer().wait_for(tail, Duration::from_secs(5)).await);
    }
    assert_eq!(
        replicas[1].state().companies.cache().peek(&c1).unwrap().name,
        "Acme Corp"
    );

    replicas[1].state().companies.delete(c1).await.unwrap();
    let tail = replicas[1]
        .state()
        .event_log
        .resolve_start(StartPosition::Latest)
        .await
        .unwrap();
    assert!(replicas[0].consumer().wait_for(tail, Duration::from_secs(5)).await);
    assert!(!replicas[0].state().companies.cache().contains(&c1));

    for replica in replicas {
        replica.shutdown().await;
    }
}
