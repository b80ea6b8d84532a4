//! Queries over the `company` table.

use companyhub_core::CompanyRecord;
use companyhub_storage::StorageError;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use uuid::Uuid;

use crate::error::map_query_error;

const ENTITY: &str = "company";

pub async fn list(pool: &PgPool) -> Result<Vec<CompanyRecord>, StorageError> {
    let rows: Vec<(Uuid, String)> = query_as("SELECT id, name FROM company ORDER BY name, id")
        .fetch_all(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, "*"))?;

    Ok(rows
        .into_iter()
        .map(|(id, name)| CompanyRecord::new(id, name))
        .collect())
}

pub async fn read(pool: &PgPool, id: Uuid) -> Result<Option<CompanyRecord>, StorageError> {
    let row: Option<(Uuid, String)> = query_as("SELECT id, name FROM company WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &id.to_string()))?;

    Ok(row.map(|(id, name)| CompanyRecord::new(id, name)))
}

pub async fn create(pool: &PgPool, name: &str) -> Result<Uuid, StorageError> {
    let id = Uuid::new_v4();
    query("INSERT INTO company (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &id.to_string()))?;
    Ok(id)
}

pub async fn update(pool: &PgPool, id: Uuid, name: &str) -> Result<(), StorageError> {
    let result = query("UPDATE company SET name = $2 WHERE id = $1")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &id.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, id));
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let result = query("DELETE FROM company WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_query_error(e, ENTITY, &id.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, id));
    }
    Ok(())
}
