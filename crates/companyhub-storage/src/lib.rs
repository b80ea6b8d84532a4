//! # companyhub-storage
//!
//! Storage abstraction layer for CompanyHub.
//!
//! This crate defines the traits and types that storage backends implement.
//! Implementations live in separate crates (`companyhub-db-memory`,
//! `companyhub-db-postgres`).
//!
//! ## Overview
//!
//! - [`CompanyStorage`] - the source of truth for company records
//! - [`UserStorage`] - registered users and their password hashes
//! - [`SessionStorage`] - refresh-token sessions
//!
//! ## Example
//!
//! ```ignore
//! use companyhub_storage::{CompanyStorage, StorageError};
//!
//! async fn rename(storage: &dyn CompanyStorage, id: Uuid) -> Result<(), StorageError> {
//!     storage.update(id, "Acme Corp").await
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{CompanyStorage, SessionStorage, UserStorage};
pub use types::{NewUser, RefreshSession, SessionClient, User};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle to a company store.
pub type DynCompanyStorage = std::sync::Arc<dyn CompanyStorage>;

/// Shared handle to a user store.
pub type DynUserStorage = std::sync::Arc<dyn UserStorage>;

/// Shared handle to a session store.
pub type DynSessionStorage = std::sync::Arc<dyn SessionStorage>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use companyhub_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{CompanyStorage, SessionStorage, UserStorage};
    pub use crate::types::{NewUser, RefreshSession, SessionClient, User};
    pub use crate::{DynCompanyStorage, DynSessionStorage, DynUserStorage, StorageResult};
}
