//! In-memory storage backend for CompanyHub.
//!
//! This crate provides in-memory implementations of the `companyhub-storage`
//! traits, using papaya lock-free HashMaps for concurrent access. It backs
//! single-instance deployments and the test suites.
//!
//! # Example
//!
//! ```ignore
//! use companyhub_db_memory::InMemoryStorage;
//! use companyhub_storage::CompanyStorage;
//!
//! let storage = InMemoryStorage::new();
//! let id = storage.create("Acme").await?;
//! ```

pub mod storage;

pub use companyhub_storage::{CompanyStorage, SessionStorage, StorageError, UserStorage};
pub use storage::InMemoryStorage;

/// Creates a new shared in-memory storage instance.
pub fn create_storage() -> std::sync::Arc<InMemoryStorage> {
    std::sync::Arc::new(InMemoryStorage::new())
}
