//! Metadata gateway over the storage emulator's catalog.
//!
//! The website engine only ever reads two things: the object record for a
//! name, and the committed block list of that object. Both lookups go through
//! the [`Catalog`] trait so the engine can run against any resolver; the
//! production implementation queries SQLite through a pooled `sqlx`
//! connection set.

use crate::models::{container::Container, object::Object, segment::Segment};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The metadata store could not be queried. Never reported as "not found".
    #[error("catalog unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Read-only access to object and segment records.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve `name` inside `container`, preferring the most recent version.
    async fn resolve_object(&self, container: &str, name: &str) -> CatalogResult<Option<Object>>;

    /// Committed segments of `object` in content order. Empty when none exist.
    ///
    /// Blocks are matched against the version stored on the object's own
    /// record, whatever text form the writer used for it.
    async fn list_segments(&self, object: &Object) -> CatalogResult<Vec<Segment>>;

    /// Cheap connectivity probe used by readiness checks.
    async fn ping(&self) -> CatalogResult<()>;
}

/// Catalog backed by the emulator's SQLite database.
#[derive(Clone, Debug)]
pub struct SqliteCatalog {
    /// Shared SQLite connection pool; concurrent requests each borrow a connection.
    pub db: Arc<SqlitePool>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert the container record unless it already exists.
    ///
    /// Returns `true` when a row was created. A unique violation means the
    /// container was provisioned earlier and is not an error.
    pub async fn ensure_container(&self, container: &Container) -> CatalogResult<bool> {
        match sqlx::query(
            "INSERT INTO blob_containers (
                account_name, container_name, last_modification_time, service_metadata,
                metadata, lease_id, lease_state, lease_duration, lease_end_time, is_lease_op
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&container.account_name)
        .bind(&container.container_name)
        .bind(container.last_modification_time)
        .bind(&container.service_metadata)
        .bind(&container.metadata)
        .bind(&container.lease_id)
        .bind(container.lease_state)
        .bind(container.lease_duration)
        .bind(container.lease_end_time)
        .bind(container.is_lease_op)
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "container `{}/{}` already exists",
                    container.account_name, container.container_name
                );
                Ok(false)
            }
            Err(err) => Err(CatalogError::Unavailable(err)),
        }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn resolve_object(&self, container: &str, name: &str) -> CatalogResult<Option<Object>> {
        let object = sqlx::query_as::<_, Object>(
            "SELECT rowid AS row_id, account_name, container_name, blob_name, version_timestamp,
                    content_type,
                    content_length, last_modification_time, service_metadata, metadata,
                    is_committed, lease_state, has_block, directory_path, file_name
             FROM blobs
             WHERE container_name = ? AND blob_name = ?
             ORDER BY version_timestamp DESC, rowid DESC
             LIMIT 1",
        )
        .bind(container)
        .bind(name)
        .fetch_optional(&*self.db)
        .await?;

        Ok(object)
    }

    async fn list_segments(&self, object: &Object) -> CatalogResult<Vec<Segment>> {
        let segments = sqlx::query_as::<_, Segment>(
            "SELECT blk.account_name AS account_name,
                    blk.container_name AS container_name,
                    blk.blob_name AS blob_name,
                    blk.version_timestamp AS version_timestamp,
                    blk.is_committed AS is_committed,
                    blk.block_id AS block_id,
                    blk.file_path AS file_path,
                    blk.start_offset AS start_offset,
                    blk.length AS length
             FROM blobs b
             JOIN blocks blk
               ON blk.account_name = b.account_name
              AND blk.container_name = b.container_name
              AND blk.blob_name = b.blob_name
              AND blk.version_timestamp = b.version_timestamp
             WHERE b.rowid = ?
               AND blk.is_committed = 1
             ORDER BY blk.rowid ASC",
        )
        .bind(object.row_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(segments)
    }

    async fn ping(&self) -> CatalogResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Apply the embedded schema, statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<usize, sqlx::Error> {
    let statements = migration_statements();
    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt.as_str()).execute(db).await?;
    }
    Ok(statements.len())
}

/// Schema statements with `--` comment lines removed, split on `;`.
fn migration_statements() -> Vec<String> {
    let sql: String = include_str!("../../migrations/0001_init.sql")
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .map(|line| format!("{line}\n"))
        .collect();
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
