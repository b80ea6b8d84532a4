use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use companyhub_core::CompanyRecord;
use companyhub_storage::{
    CompanyStorage, NewUser, RefreshSession, SessionStorage, StorageError, User, UserStorage,
};
use papaya::HashMap as PapayaHashMap;
use uuid::Uuid;

/// In-memory storage backend using papaya lock-free HashMaps.
///
/// Besides the storage traits it counts company reads, so tests can assert
/// that a cached lookup never reached the store.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    companies: PapayaHashMap<Uuid, CompanyRecord>,
    users: PapayaHashMap<Uuid, User>,
    /// username -> user id, enforces username uniqueness
    usernames: PapayaHashMap<String, Uuid>,
    sessions: PapayaHashMap<Uuid, RefreshSession>,
    company_reads: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a company with a caller-chosen id, replacing any existing row.
    pub fn seed(&self, record: CompanyRecord) {
        self.companies.pin().insert(record.id, record);
    }

    /// Number of `CompanyStorage::read` calls served so far.
    pub fn company_reads(&self) -> u64 {
        self.company_reads.load(Ordering::Relaxed)
    }

    pub fn company_count(&self) -> usize {
        self.companies.pin().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.pin().len()
    }
}

#[async_trait]
impl CompanyStorage for InMemoryStorage {
    async fn list(&self) -> Result<Vec<CompanyRecord>, StorageError> {
        let guard = self.companies.pin();
        let mut records: Vec<CompanyRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn read(&self, id: Uuid) -> Result<Option<CompanyRecord>, StorageError> {
        self.company_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.companies.pin().get(&id).cloned())
    }

    async fn create(&self, name: &str) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        self.companies
            .pin()
            .insert(id, CompanyRecord::new(id, name));
        Ok(id)
    }

    async fn update(&self, id: Uuid, name: &str) -> Result<(), StorageError> {
        self.companies
            .pin()
            .update(id, |existing| existing.renamed(name))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("company", id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        self.companies
            .pin()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("company", id))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl UserStorage for InMemoryStorage {
    async fn create_user(&self, user: &NewUser) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        if self
            .usernames
            .pin()
            .try_insert(user.username.clone(), id)
            .is_err()
        {
            return Err(StorageError::already_exists("user", user.username.clone()));
        }
        self.users.pin().insert(
            id,
            User {
                id,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
            },
        );
        Ok(id)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let Some(id) = self.usernames.pin().get(username).copied() else {
            return Ok(None);
        };
        Ok(self.users.pin().get(&id).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.users.pin().get(&id).cloned())
    }
}

#[async_trait]
impl SessionStorage for InMemoryStorage {
    async fn create_session(&self, session: &RefreshSession) -> Result<(), StorageError> {
        if self
            .sessions
            .pin()
            .try_insert(session.token, session.clone())
            .is_err()
        {
            return Err(StorageError::already_exists(
                "session",
                session.token.to_string(),
            ));
        }
        Ok(())
    }

    async fn take_session(&self, token: Uuid) -> Result<Option<RefreshSession>, StorageError> {
        Ok(self.sessions.pin().remove(&token).cloned())
    }

    async fn delete_session(&self, token: Uuid) -> Result<(), StorageError> {
        self.sessions
            .pin()
            .remove(&token)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("session", token))
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, StorageError> {
        let guard = self.sessions.pin();
        let tokens: Vec<Uuid> = guard
            .iter()
            .filter(|(_, session)| session.user_id == user_id)
            .map(|(token, _)| *token)
            .collect();
        let removed = tokens
            .iter()
            .filter(|token| guard.remove(*token).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companyhub_storage::SessionClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_company_crud() {
        let storage = InMemoryStorage::new();

        let id = storage.create("Acme").await.unwrap();
        assert_eq!(storage.company_count(), 1);

        let read = storage.read(id).await.unwrap().unwrap();
        assert_eq!(read, CompanyRecord::new(id, "Acme"));

        storage.update(id, "Acme Corp").await.unwrap();
        let read = storage.read(id).await.unwrap().unwrap();
        assert_eq!(read.name, "Acme Corp");

        storage.delete(id).await.unwrap();
        assert!(storage.read(id).await.unwrap().is_none());
        assert_eq!(storage.company_reads(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_of_absent_company_are_not_found() {
        let storage = InMemoryStorage::new();
        let missing = Uuid::new_v4();

        let err = storage.update(missing, "Ghost").await.unwrap_err();
        assert!(err.is_not_found());

        let err = storage.delete(missing).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(storage.company_count(), 0);
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_name() {
        let storage = InMemoryStorage::new();
        storage.create("Zeta").await.unwrap();
        storage.create("Alpha").await.unwrap();
        storage.create("Mid").await.unwrap();

        let names: Vec<String> = storage
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[tokio::test]
    async fn test_seed_uses_given_id() {
        let storage = InMemoryStorage::new();
        let id = Uuid::new_v4();
        storage.seed(CompanyRecord::new(id, "Acme"));
        assert_eq!(storage.read(id).await.unwrap().unwrap().name, "Acme");
    }

    #[tokio::test]
    async fn test_concurrent_creates() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.create(&format!("company-{i}")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(storage.company_count(), 32);
    }

    #[tokio::test]
    async fn test_usernames_are_unique() {
        let storage = InMemoryStorage::new();
        let user = NewUser {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
        };
        let id = storage.create_user(&user).await.unwrap();
        let err = storage.create_user(&user).await.unwrap_err();
        assert!(err.is_already_exists());

        let found = storage.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(storage.find_by_id(id).await.unwrap().unwrap().email, "alice@example.com");
        assert!(storage.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_single_use() {
        let storage = InMemoryStorage::new();
        let user_id = Uuid::new_v4();
        let session =
            RefreshSession::issue(user_id, SessionClient::default(), time::Duration::hours(1));

        storage.create_session(&session).await.unwrap();
        assert_eq!(storage.take_session(session.token).await.unwrap(), Some(session.clone()));
        assert!(storage.take_session(session.token).await.unwrap().is_none());
        assert!(storage.delete_session(session.token).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_user_sessions() {
        let storage = InMemoryStorage::new();
        let user_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        for owner in [user_id, user_id, other] {
            let session =
                RefreshSession::issue(owner, SessionClient::default(), time::Duration::hours(1));
            storage.create_session(&session).await.unwrap();
        }

        assert_eq!(storage.delete_user_sessions(user_id).await.unwrap(), 2);
        assert_eq!(storage.session_count(), 1);
    }
}
