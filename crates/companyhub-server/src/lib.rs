pub mod cache;
pub mod config;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod service;

pub use cache::{CacheStats, LocalCache};
pub use config::{
    AppConfig, CoherenceConfig, ConsumerConfig, EventLogConfig, PostgresStorageConfig,
    RedisConfig, ServerConfig,
};
pub use events::{
    ConsumerHandle, EventConsumer, EventLog, EventLogError, EventProducer, InMemoryEventLog,
    RedisStreamLog,
};
pub use observability::init_tracing;
pub use server::{AppState, CompanyHubServer, ServerBuilder, build_app};
pub use service::{CompanyService, ServiceError};
