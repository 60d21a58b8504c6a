//! Fixtures shared by the service tests.

use crate::{
    models::{object::Object, segment::Segment},
    services::catalog::{SqliteCatalog, run_migrations},
};
use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Fresh in-memory catalog with the schema applied.
///
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn memory_catalog() -> SqliteCatalog {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    SqliteCatalog::new(Arc::new(pool))
}

/// A committed `$web` object last modified at 2024-03-05 10:00:00 UTC.
pub fn object_named(name: &str) -> Object {
    Object {
        row_id: 0,
        account_name: "devstoreaccount1".into(),
        container_name: "$web".into(),
        name: name.into(),
        version_timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        content_type: Some("text/html".into()),
        content_length: 0,
        last_modification_time: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        service_metadata: Vec::new(),
        metadata: Vec::new(),
        is_committed: true,
        lease_state: 0,
        has_block: true,
        directory_path: None,
        file_name: None,
    }
}

pub fn segment_of(object: &Object, block_id: &str, path: &str, offset: i64, length: i64) -> Segment {
    Segment {
        account_name: object.account_name.clone(),
        container_name: object.container_name.clone(),
        object_name: object.name.clone(),
        version_timestamp: object.version_timestamp,
        is_committed: true,
        block_id: block_id.into(),
        file_path: path.into(),
        start_offset: offset,
        length,
    }
}

/// Insert `object` and return it with the row id the catalog assigned.
pub async fn insert_object(catalog: &SqliteCatalog, object: &Object) -> Object {
    let result = sqlx::query(
        "INSERT INTO blobs (
            account_name, container_name, blob_name, version_timestamp, creation_time,
            last_modification_time, content_length, content_type, service_metadata, metadata,
            lease_state, is_committed, has_block, directory_path, file_name
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&object.account_name)
    .bind(&object.container_name)
    .bind(&object.name)
    .bind(object.version_timestamp)
    .bind(object.version_timestamp)
    .bind(object.last_modification_time)
    .bind(object.content_length)
    .bind(&object.content_type)
    .bind(&object.service_metadata)
    .bind(&object.metadata)
    .bind(object.lease_state)
    .bind(object.is_committed)
    .bind(object.has_block)
    .bind(&object.directory_path)
    .bind(&object.file_name)
    .execute(&*catalog.db)
    .await
    .unwrap();

    Object {
        row_id: result.last_insert_rowid(),
        ..object.clone()
    }
}

pub async fn insert_segment(
    catalog: &SqliteCatalog,
    object: &Object,
    block_id: &str,
    path: &str,
    offset: i64,
    length: i64,
    committed: bool,
) {
    sqlx::query(
        "INSERT INTO blocks (
            account_name, container_name, blob_name, version_timestamp, is_committed,
            block_id, length, start_offset, file_path
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&object.account_name)
    .bind(&object.container_name)
    .bind(&object.name)
    .bind(object.version_timestamp)
    .bind(committed)
    .bind(block_id)
    .bind(length)
    .bind(offset)
    .bind(path)
    .execute(&*catalog.db)
    .await
    .unwrap();
}

/// Write `content` to `dir/name` and return the path.
pub fn write_block_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Store `object` with one committed block per part, each part appended to
/// `block_file` inside `dir`. Returns the stored object.
pub async fn store_object(
    catalog: &SqliteCatalog,
    dir: &Path,
    block_file: &str,
    object: Object,
    parts: &[&[u8]],
) -> Object {
    use std::io::Write;

    let path = dir.join(block_file);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .unwrap();
    let mut offset = file.metadata().unwrap().len() as i64;

    let object = insert_object(
        catalog,
        &Object {
            content_length: parts.iter().map(|p| p.len() as i64).sum(),
            ..object
        },
    )
    .await;

    for (i, part) in parts.iter().enumerate() {
        file.write_all(part).unwrap();
        let path = path.to_string_lossy();
        insert_segment(catalog, &object, &format!("block-{i}"), &path, offset, part.len() as i64, true)
            .await;
        offset += part.len() as i64;
    }

    object
}
