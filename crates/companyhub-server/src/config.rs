use companyhub_auth::AuthConfig;
use companyhub_core::StartPosition;
use companyhub_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    /// Shared mutation log
    #[serde(default)]
    pub event_log: EventLogConfig,
    /// Cache coherence: publishing and the log consumer
    #[serde(default)]
    pub coherence: CoherenceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("server.request_timeout_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            let pg = &self.storage.postgres;
            if pg.url.is_none() && pg.host.is_empty() {
                return Err("storage.postgres requires either 'url' or 'host' to be set".into());
            }
            if pg.url.is_none() && pg.database.is_empty() {
                return Err("storage.postgres.database must not be empty".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        // Event log validation
        if self.event_log.stream_key.is_empty() {
            return Err("event_log.stream_key must not be empty".into());
        }
        if self.event_log.backend == EventLogBackend::Redis && self.redis.url.is_empty() {
            return Err("event_log.backend=redis requires redis.url".into());
        }
        // Coherence validation
        let consumer = &self.coherence.consumer;
        if consumer.batch_size == 0 {
            return Err("coherence.consumer.batch_size must be > 0".into());
        }
        if consumer.block_ms == 0 {
            return Err("coherence.consumer.block_ms must be > 0".into());
        }
        if consumer.backoff_initial_ms == 0 {
            return Err("coherence.consumer.backoff_initial_ms must be > 0".into());
        }
        if consumer.backoff_initial_ms > consumer.backoff_max_ms {
            return Err(
                "coherence.consumer.backoff_initial_ms must be <= backoff_max_ms".into(),
            );
        }
        // Auth validation
        if self.auth.enabled && self.auth.access_token_secret.is_empty() {
            return Err("auth.enabled=true requires auth.access_token_secret".into());
        }
        if self.auth.access_token_ttl_secs == 0 || self.auth.refresh_token_ttl_secs == 0 {
            return Err("auth token ttls must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Upper bound on handling one request, body included.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_ms() -> u64 {
    15_000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresStorageConfig,
}

/// PostgreSQL storage configuration
///
/// Either set `url` to a full connection string, or set `host`, `port`,
/// `user`, `password` and `database` individually. `url` takes precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_postgres_host")]
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    #[serde(default = "default_postgres_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_postgres_database")]
    pub database: String,
    #[serde(default = "default_postgres_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_postgres_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_postgres_host() -> String {
    "localhost".into()
}
fn default_postgres_port() -> u16 {
    5432
}
fn default_postgres_user() -> String {
    "postgres".into()
}
fn default_postgres_database() -> String {
    "companyhub".into()
}
fn default_postgres_pool_size() -> u32 {
    10
}
fn default_postgres_connect_timeout() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

impl PostgresStorageConfig {
    /// Returns `url` if set, otherwise builds one from the individual options.
    pub fn connection_url(&self) -> String {
        if let Some(ref url) = self.url {
            return url.clone();
        }

        let password_part = self
            .password
            .as_ref()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();

        format!(
            "postgres://{}{}@{}:{}/{}",
            self.user, password_part, self.host, self.port, self.database
        )
    }

    pub fn to_postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            url: self.connection_url(),
            max_connections: self.pool_size,
            acquire_timeout: Duration::from_millis(self.connect_timeout_ms),
            idle_timeout: self.idle_timeout_ms.map(Duration::from_millis),
            run_migrations: self.run_migrations,
        }
    }
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_postgres_host(),
            port: default_postgres_port(),
            user: default_postgres_user(),
            password: None,
            database: default_postgres_database(),
            pool_size: default_postgres_pool_size(),
            connect_timeout_ms: default_postgres_connect_timeout(),
            idle_timeout_ms: Some(300_000), // 5 minutes
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".into()
}
fn default_redis_pool_size() -> usize {
    10
}
fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventLogBackend {
    #[default]
    Redis,
    /// Process-local log; only coherent within a single instance.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    #[serde(default)]
    pub backend: EventLogBackend,
    /// Redis stream key
    #[serde(default = "default_stream_key")]
    pub stream_key: String,
    /// Approximate MAXLEN trim applied on append; unbounded when unset.
    #[serde(default)]
    pub max_len: Option<usize>,
}

fn default_stream_key() -> String {
    "company".into()
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            backend: EventLogBackend::default(),
            stream_key: default_stream_key(),
            max_len: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceConfig {
    /// Publish DELETE and UPDATE events for local writes.
    #[serde(default = "default_true")]
    pub publish_mutations: bool,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            publish_mutations: true,
            consumer: ConsumerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerStart {
    /// Skip events emitted before the process started.
    #[default]
    Latest,
    /// Replay the whole retained log.
    Beginning,
}

impl From<ConsumerStart> for StartPosition {
    fn from(start: ConsumerStart) -> Self {
        match start {
            ConsumerStart::Latest => StartPosition::Latest,
            ConsumerStart::Beginning => StartPosition::Beginning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub start: ConsumerStart,
    /// Maximum entries per read
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How long a read blocks waiting for new entries
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_batch_size() -> usize {
    100
}
fn default_block_ms() -> u64 {
    5000
}
fn default_backoff_initial_ms() -> u64 {
    100
}
fn default_backoff_max_ms() -> u64 {
    30_000
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            start: ConsumerStart::default(),
            batch_size: default_batch_size(),
            block_ms: default_block_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "companyhub.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", pathbuf.display()));
        }
        // Environment variable overrides, e.g., COMPANYHUB__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("COMPANYHUB")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
