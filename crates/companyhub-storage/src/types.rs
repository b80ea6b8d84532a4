//! Records persisted alongside companies.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Input for registering a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Client properties bound to a refresh session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClient {
    pub user_agent: String,
    pub fingerprint: String,
    pub ip: String,
}

/// A refresh-token session.
///
/// The `token` is handed to the client as the refresh token and is
/// single-use: a refresh deletes the session and issues a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSession {
    pub token: Uuid,
    pub user_id: Uuid,
    pub client: SessionClient,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RefreshSession {
    /// Creates a session for `user_id` valid for `ttl` from now.
    pub fn issue(user_id: Uuid, client: SessionClient, ttl: time::Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            token: Uuid::new_v4(),
            user_id,
            client,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}
