//! Queries over the `refresh_sessions` table.

use chrono::{DateTime, Utc};
use companyhub_storage::{RefreshSession, SessionClient, StorageError};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use uuid::Uuid;

use super::{chrono_to_time, time_to_chrono};
use crate::error::map_query_error;

const ENTITY: &str = "session";

type SessionRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn into_session(row: SessionRow) -> RefreshSession {
    let (token, user_id, user_agent, fingerprint, ip, expires_at, created_at) = row;
    RefreshSession {
        token,
        user_id,
        client: SessionClient {
            user_agent,
            fingerprint,
            ip,
        },
        expires_at: chrono_to_time(expires_at),
        created_at: chrono_to_time(created_at),
    }
}

pub async fn create(pool: &PgPool, session: &RefreshSession) -> Result<(), StorageError> {
    query(
        r#"INSERT INTO refresh_sessions
               (token, user_id, user_agent, fingerprint, ip, expires_at, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
    )
    .bind(session.token)
    .bind(session.user_id)
    .bind(&session.client.user_agent)
    .bind(&session.client.fingerprint)
    .bind(&session.client.ip)
    .bind(time_to_chrono(session.expires_at))
    .bind(time_to_chrono(session.created_at))
    .execute(pool)
    .await
    .map_err(|e| map_query_error(e, ENTITY, &session.token.to_string()))?;
    Ok(())
}

pub async fn take(pool: &PgPool, token: Uuid) -> Result<Option<RefreshSession>, StorageError> {
    let row: Option<SessionRow> = query_as(
        r#"DELETE FROM refresh_sessions WHERE token = $1
           RETURNING token, user_id, user_agent, fingerprint, ip, expires_at, created_at"#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(|e| map_query_error(e, ENTITY, &token.to_string()))?;
    Ok(row.map(into_session))
}

pub async fn delete(pool: &PgPool, token: Uuid) -> Result<(), StorageError> {
    let result = query("DELETE FROM refresh_sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &token.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, token));
    }
    Ok(())
}

pub async fn delete_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, StorageError> {
    let result = query("DELETE FROM refresh_sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &user_id.to_string()))?;
    Ok(result.rows_affected())
}
