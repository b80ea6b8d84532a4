//! Redis Streams event log.
//!
//! Each mutation becomes one stream entry with the fields `id`, `action`
//! and `name`; the stream id (`<millis>-<seq>`) is the cursor. Appends go
//! through the shared connection pool. Every subscription owns a dedicated
//! connection, since `XREAD BLOCK` parks the connection it runs on.

use std::time::Duration;

use async_trait::async_trait;
use companyhub_core::{Cursor, LogEntry, MutationEvent, RawEvent, StartPosition};
use deadpool_redis::redis::aio::MultiplexedConnection;
use deadpool_redis::redis::streams::{
    StreamId, StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply,
};
use deadpool_redis::redis::{self, AsyncCommands, Client};
use deadpool_redis::{Pool, PoolConfig, Runtime};
use tracing::{debug, info};

use super::{EventLog, EventLogError, EventSubscription};
use crate::config::{EventLogConfig, RedisConfig};

/// Builds the Redis connection pool used for appends and health checks.
pub fn create_redis_pool(config: &RedisConfig) -> Result<Pool, EventLogError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    redis_config.pool = Some(pool_config);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| EventLogError::Pool(e.to_string()))
}

/// [`EventLog`] backed by a single Redis stream.
pub struct RedisStreamLog {
    pool: Pool,
    client: Client,
    stream_key: String,
    max_len: Option<usize>,
}

impl RedisStreamLog {
    pub fn new(
        pool: Pool,
        redis_url: &str,
        config: &EventLogConfig,
    ) -> Result<Self, EventLogError> {
        let client =
            Client::open(redis_url).map_err(|e| EventLogError::Connection(e.to_string()))?;
        Ok(Self {
            pool,
            client,
            stream_key: config.stream_key.clone(),
            max_len: config.max_len,
        })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, EventLogError> {
        self.pool
            .get()
            .await
            .map_err(|e| EventLogError::Pool(e.to_string()))
    }

    /// Id of the newest entry, or [`Cursor::ZERO`] for an empty stream.
    async fn tail(&self) -> Result<Cursor, EventLogError> {
        let mut conn = self.connection().await?;
        let reply: StreamRangeReply = conn
            .xrevrange_count(&self.stream_key, "+", "-", 1)
            .await
            .map_err(command_error)?;
        match reply.ids.first() {
            Some(entry) => parse_cursor(&entry.id),
            None => Ok(Cursor::ZERO),
        }
    }
}

#[async_trait]
impl EventLog for RedisStreamLog {
    async fn append(&self, event: &MutationEvent) -> Result<Cursor, EventLogError> {
        let raw = RawEvent::from(event);
        let fields = raw.fields();
        let mut conn = self.connection().await?;

        let id: String = match self.max_len {
            Some(max_len) => conn
                .xadd_maxlen(
                    &self.stream_key,
                    StreamMaxlen::Approx(max_len),
                    "*",
                    &fields[..],
                )
                .await
                .map_err(command_error)?,
            None => conn
                .xadd(&self.stream_key, "*", &fields[..])
                .await
                .map_err(command_error)?,
        };

        parse_cursor(&id)
    }

    async fn resolve_start(&self, start: StartPosition) -> Result<Cursor, EventLogError> {
        match start {
            // The stream tail, not the local clock: replicas and Redis may disagree on time.
            StartPosition::Latest => self.tail().await,
            StartPosition::Beginning => {
                self.ping().await?;
                Ok(Cursor::ZERO)
            }
            StartPosition::After(cursor) => Ok(cursor),
        }
    }

    async fn subscribe(&self, from: Cursor) -> Result<Box<dyn EventSubscription>, EventLogError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| EventLogError::Connection(e.to_string()))?;

        info!(stream = %self.stream_key, cursor = %from, "subscribed to event stream");

        Ok(Box::new(RedisStreamSubscription {
            conn,
            stream_key: self.stream_key.clone(),
            position: from,
        }))
    }

    async fn ping(&self) -> Result<(), EventLogError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

struct RedisStreamSubscription {
    conn: MultiplexedConnection,
    stream_key: String,
    position: Cursor,
}

#[async_trait]
impl EventSubscription for RedisStreamSubscription {
    async fn next_batch(
        &mut self,
        max: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, EventLogError> {
        // BLOCK 0 would wait forever
        let block_ms = usize::try_from(block.as_millis()).unwrap_or(usize::MAX).max(1);
        let options = StreamReadOptions::default().count(max.max(1)).block(block_ms);

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(
                &[self.stream_key.as_str()],
                &[self.position.to_string()],
                &options,
            )
            .await
            .map_err(|e| EventLogError::Connection(e.to_string()))?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                batch.push(to_log_entry(&entry)?);
            }
        }
        if let Some(last) = batch.last() {
            self.position = last.cursor;
        }
        debug!(stream = %self.stream_key, count = batch.len(), "read stream entries");
        Ok(batch)
    }

    fn position(&self) -> Cursor {
        self.position
    }
}

fn to_log_entry(entry: &StreamId) -> Result<LogEntry, EventLogError> {
    let cursor = parse_cursor(&entry.id)?;
    // Missing fields are left empty and rejected when the event is decoded.
    let event = RawEvent {
        id: entry.get(RawEvent::FIELD_ID).unwrap_or_default(),
        action: entry.get(RawEvent::FIELD_ACTION).unwrap_or_default(),
        name: entry.get(RawEvent::FIELD_NAME).unwrap_or_default(),
    };
    Ok(LogEntry::new(cursor, event))
}

fn parse_cursor(id: &str) -> Result<Cursor, EventLogError> {
    id.parse()
        .map_err(|_| EventLogError::Malformed(format!("invalid stream id '{id}'")))
}

fn command_error(err: redis::RedisError) -> EventLogError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        EventLogError::Connection(err.to_string())
    } else {
        EventLogError::Command(err.to_string())
    }
}
