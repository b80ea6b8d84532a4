use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use companyhub_auth::AuthService;
use companyhub_core::Cursor;
use companyhub_db_memory::InMemoryStorage;
use companyhub_db_postgres::PostgresStorage;
use companyhub_storage::{DynCompanyStorage, DynSessionStorage, DynUserStorage};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::cache::LocalCache;
use crate::config::{AppConfig, EventLogBackend, StorageBackend};
use crate::events::{
    ConsumerHandle, ConsumerSettings, EventConsumer, EventLog, EventProducer, InMemoryEventLog,
    RedisStreamLog, create_redis_pool,
};
use crate::service::CompanyService;
use crate::{handlers, middleware as app_middleware};

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub companies: Arc<CompanyService>,
    /// `None` when authentication is disabled.
    pub auth: Option<Arc<AuthService>>,
    pub event_log: Arc<dyn EventLog>,
    /// Last cursor applied by this replica's consumer.
    pub consumer_progress: watch::Receiver<Cursor>,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let mut router = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .route("/cache/stats", get(handlers::cache_stats))
        .route(
            "/companies",
            get(handlers::list_companies).post(handlers::create_company),
        )
        .route(
            "/companies/{id}",
            get(handlers::get_company)
                .put(handlers::update_company)
                .delete(handlers::delete_company),
        );

    if let Some(auth) = state.auth.clone() {
        router = router.merge(auth_routes(auth));
    }

    // Outermost last: trace, compression, cors, request id, metrics, auth, timeout, body limit
    router
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            cfg.request_timeout(),
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::authentication_middleware,
        ))
        .layer(middleware::from_fn(app_middleware::http_metrics))
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .with_state(state)
}

/// Sign-up, sign-in, refresh and logout; mounted only when auth is enabled.
fn auth_routes<S>(auth: Arc<AuthService>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/auth/sign-up", post(handlers::sign_up))
        .route("/auth/sign-in", post(handlers::sign_in))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .with_state(auth)
}

/// Assembles storage, the event log, the cache and its consumer.
///
/// Backends chosen by the configuration can be replaced with explicit
/// handles, which is how tests run several replicas against one store
/// and one log inside a single process.
pub struct ServerBuilder {
    config: AppConfig,
    companies: Option<DynCompanyStorage>,
    auth_storage: Option<(DynUserStorage, DynSessionStorage)>,
    event_log: Option<Arc<dyn EventLog>>,
    cancel: CancellationToken,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            companies: None,
            auth_storage: None,
            event_log: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_company_storage(mut self, storage: DynCompanyStorage) -> Self {
        self.companies = Some(storage);
        self
    }

    pub fn with_auth_storage(mut self, users: DynUserStorage, sessions: DynSessionStorage) -> Self {
        self.auth_storage = Some((users, sessions));
        self
    }

    pub fn with_event_log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Token that stops the consumer (and `run`) when cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// # Errors
    ///
    /// Fails if a storage backend cannot be reached, the event log cannot
    /// be subscribed to, or the auth configuration is unusable.
    pub async fn build(self) -> anyhow::Result<CompanyHubServer> {
        let cfg = self.config;

        let (companies, users, sessions) = match (self.companies, self.auth_storage) {
            (Some(companies), Some((users, sessions))) => (companies, users, sessions),
            (companies, auth_storage) => {
                let (default_companies, default_users, default_sessions) =
                    create_storage(&cfg).await?;
                let (users, sessions) =
                    auth_storage.unwrap_or((default_users, default_sessions));
                (companies.unwrap_or(default_companies), users, sessions)
            }
        };

        let event_log = match self.event_log {
            Some(log) => log,
            None => create_event_log(&cfg)?,
        };

        let auth = if cfg.auth.enabled {
            let service = AuthService::new(users, sessions, cfg.auth.clone())
                .context("invalid auth configuration")?;
            Some(Arc::new(service))
        } else {
            tracing::warn!("authentication is disabled; all endpoints are public");
            None
        };

        // The consumer holds a log subscription; start it after every fallible step.
        let cache = Arc::new(LocalCache::new());
        let consumer_cache = Arc::clone(&cache);
        let consumer = EventConsumer::new(
            Arc::clone(&event_log),
            ConsumerSettings::from(&cfg.coherence.consumer),
        )
        .spawn(self.cancel.clone(), move |event| consumer_cache.apply(event))
        .await
        .context("failed to subscribe to the event log")?;

        let companies = Arc::new(CompanyService::new(
            companies,
            cache,
            EventProducer::new(Arc::clone(&event_log)),
            cfg.coherence.publish_mutations,
        ));

        let state = AppState {
            companies,
            auth,
            event_log,
            consumer_progress: consumer.progress(),
        };
        let app = build_app(state.clone(), &cfg);

        Ok(CompanyHubServer {
            addr: cfg.addr(),
            app,
            state,
            consumer,
            cancel: self.cancel,
        })
    }
}

async fn create_storage(
    cfg: &AppConfig,
) -> anyhow::Result<(DynCompanyStorage, DynUserStorage, DynSessionStorage)> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage");
            let storage = Arc::new(InMemoryStorage::new());
            let companies: DynCompanyStorage = storage.clone();
            let users: DynUserStorage = storage.clone();
            let sessions: DynSessionStorage = storage;
            Ok((companies, users, sessions))
        }
        StorageBackend::Postgres => {
            let storage = PostgresStorage::new(cfg.storage.postgres.to_postgres_config())
                .await
                .context("failed to connect to PostgreSQL")?;
            let storage = Arc::new(storage);
            let companies: DynCompanyStorage = storage.clone();
            let users: DynUserStorage = storage.clone();
            let sessions: DynSessionStorage = storage;
            Ok((companies, users, sessions))
        }
    }
}

fn create_event_log(cfg: &AppConfig) -> anyhow::Result<Arc<dyn EventLog>> {
    match cfg.event_log.backend {
        EventLogBackend::Memory => {
            tracing::info!("using in-memory event log; replicas will not share invalidations");
            Ok(Arc::new(InMemoryEventLog::new()))
        }
        EventLogBackend::Redis => {
            tracing::info!(
                url = %cfg.redis.url,
                stream = %cfg.event_log.stream_key,
                "using Redis stream event log"
            );
            let pool = create_redis_pool(&cfg.redis).context("failed to create Redis pool")?;
            let log = RedisStreamLog::new(pool, &cfg.redis.url, &cfg.event_log)
                .context("invalid Redis URL")?;
            Ok(Arc::new(log))
        }
    }
}

pub struct CompanyHubServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
    consumer: ConsumerHandle,
    cancel: CancellationToken,
}

impl CompanyHubServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn consumer(&self) -> &ConsumerHandle {
        &self.consumer
    }

    /// Binds the configured address and serves until Ctrl+C or cancellation.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        let cancel = self.cancel.clone();
        self.serve(listener, async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = cancel.cancelled() => {}
            }
        })
        .await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// stops the event consumer.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "listening");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.consumer.shutdown().await;
        tracing::info!("server stopped");
        Ok(())
    }

    /// Stops the consumer without serving; used when the router is driven directly.
    pub async fn shutdown(self) {
        self.consumer.shutdown().await;
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
