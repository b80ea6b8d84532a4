//! Storage traits implemented by every backend.

use async_trait::async_trait;
use companyhub_core::CompanyRecord;
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::{NewUser, RefreshSession, User};

/// The relational source of truth for companies.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait CompanyStorage: Send + Sync {
    /// Returns every company.
    async fn list(&self) -> Result<Vec<CompanyRecord>, StorageError>;

    /// Reads a company by id.
    ///
    /// Returns `None` if the company does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing rows.
    async fn read(&self, id: Uuid) -> Result<Option<CompanyRecord>, StorageError>;

    /// Inserts a company and returns its generated id.
    async fn create(&self, name: &str) -> Result<Uuid, StorageError>;

    /// Renames an existing company.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the company does not exist.
    async fn update(&self, id: Uuid, name: &str) -> Result<(), StorageError>;

    /// Deletes a company.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the company does not exist.
    async fn delete(&self, id: Uuid) -> Result<(), StorageError>;

    /// Returns the backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Registered users.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Inserts a user and returns its generated id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the username is taken.
    async fn create_user(&self, user: &NewUser) -> Result<Uuid, StorageError>;

    /// Looks a user up by username. Returns `None` when absent.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Looks a user up by id. Returns `None` when absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;
}

/// Refresh-token sessions.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn create_session(&self, session: &RefreshSession) -> Result<(), StorageError>;

    /// Atomically removes and returns the session for `token`.
    ///
    /// Returns `None` if no such session exists, so that a refresh token can
    /// only be redeemed once.
    async fn take_session(&self, token: Uuid) -> Result<Option<RefreshSession>, StorageError>;

    /// Deletes the session for `token`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn delete_session(&self, token: Uuid) -> Result<(), StorageError>;

    /// Drops every session of a user. Returns how many were removed.
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, StorageError>;
}
