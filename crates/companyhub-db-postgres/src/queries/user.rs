//! Queries over the `users` table.

use companyhub_storage::{NewUser, StorageError, User};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use uuid::Uuid;

use crate::error::map_query_error;

const ENTITY: &str = "user";

type UserRow = (Uuid, String, String, String);

fn into_user((id, username, email, password_hash): UserRow) -> User {
    User {
        id,
        username,
        email,
        password_hash,
    }
}

pub async fn create(pool: &PgPool, user: &NewUser) -> Result<Uuid, StorageError> {
    let id = Uuid::new_v4();
    query("INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &user.username))?;
    Ok(id)
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, StorageError> {
    let row: Option<UserRow> =
        query_as("SELECT id, username, email, password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_query_error(e, ENTITY, username))?;
    Ok(row.map(into_user))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, StorageError> {
    let row: Option<UserRow> =
        query_as("SELECT id, username, email, password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_query_error(e, ENTITY, &id.to_string()))?;
    Ok(row.map(into_user))
}
