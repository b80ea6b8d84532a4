//! PostgreSQL implementation of the storage traits.

use async_trait::async_trait;
use companyhub_core::CompanyRecord;
use companyhub_storage::{
    CompanyStorage, NewUser, RefreshSession, SessionStorage, StorageError, User, UserStorage,
};
use sqlx_postgres::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::queries::{company, session, user};
use crate::{migrations, pool};

/// PostgreSQL storage backend for companies, users and sessions.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a pool from `config` and runs migrations if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::connect(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        info!(
            url = %pool::redact_url(&config.url),
            "PostgreSQL storage ready"
        );
        Ok(Self { pool })
    }

    /// Wraps an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Checks that the database answers queries.
    pub async fn ping(&self) -> Result<(), StorageError> {
        pool::ping(&self.pool).await.map_err(StorageError::from)
    }
}

#[async_trait]
impl CompanyStorage for PostgresStorage {
    async fn list(&self) -> Result<Vec<CompanyRecord>, StorageError> {
        company::list(&self.pool).await
    }

    async fn read(&self, id: Uuid) -> Result<Option<CompanyRecord>, StorageError> {
        company::read(&self.pool, id).await
    }

    async fn create(&self, name: &str) -> Result<Uuid, StorageError> {
        company::create(&self.pool, name).await
    }

    async fn update(&self, id: Uuid, name: &str) -> Result<(), StorageError> {
        company::update(&self.pool, id, name).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        company::delete(&self.pool, id).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl UserStorage for PostgresStorage {
    async fn create_user(&self, new_user: &NewUser) -> Result<Uuid, StorageError> {
        user::create(&self.pool, new_user).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        user::find_by_username(&self.pool, username).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        user::find_by_id(&self.pool, id).await
    }
}

#[async_trait]
impl SessionStorage for PostgresStorage {
    async fn create_session(&self, refresh: &RefreshSession) -> Result<(), StorageError> {
        session::create(&self.pool, refresh).await
    }

    async fn take_session(&self, token: Uuid) -> Result<Option<RefreshSession>, StorageError> {
        session::take(&self.pool, token).await
    }

    async fn delete_session(&self, token: Uuid) -> Result<(), StorageError> {
        session::delete(&self.pool, token).await
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, StorageError> {
        session::delete_for_user(&self.pool, user_id).await
    }
}
