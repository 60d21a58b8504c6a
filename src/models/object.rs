//! Represents an object (blob) stored in a container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;

/// A single stored object within a container.
///
/// The struct carries metadata only. The bytes live in backing block files
/// referenced by [`Segment`](super::segment::Segment) rows, or, for objects
/// stored as one whole file, at `directory_path/file_name`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Object {
    /// SQLite rowid of the catalog record this object was read from.
    #[serde(skip)]
    pub row_id: i64,

    /// Storage account owning the container.
    pub account_name: String,

    /// Container the object lives in.
    pub container_name: String,

    /// Object name (path-like identifier within the container).
    #[sqlx(rename = "blob_name")]
    pub name: String,

    /// Version timestamp; together with the name it forms the natural key.
    pub version_timestamp: DateTime<Utc>,

    /// Content type (MIME type) recorded at upload time.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub content_length: i64,

    /// Timestamp when the object was last modified.
    pub last_modification_time: DateTime<Utc>,

    /// CRLF-delimited `Key:Value` service properties (cache control, disposition, ...).
    pub service_metadata: Vec<u8>,

    /// User metadata blob, carried but not interpreted.
    pub metadata: Vec<u8>,

    /// Whether the object has been committed.
    pub is_committed: bool,

    /// Lease state as recorded by the emulator, not interpreted here.
    pub lease_state: i64,

    /// Whether the object body is described by block rows.
    pub has_block: bool,

    /// Directory of the whole-file payload, when the object is stored as one file.
    pub directory_path: Option<String>,

    /// File name of the whole-file payload.
    pub file_name: Option<String>,
}

impl Object {
    /// Path of the whole-file payload, if the catalog recorded one.
    pub fn payload_path(&self) -> Option<PathBuf> {
        let file_name = self.file_name.as_deref().filter(|f| !f.trim().is_empty())?;
        let mut path = self
            .directory_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_default();
        path.push(file_name);
        Some(path)
    }
}
