//! Represents one committed byte range (block) of an object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A block of object content stored in an append-only backing file.
///
/// Committed segments of one object, in catalog order, concatenate to the
/// object's full content.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Segment {
    pub account_name: String,
    pub container_name: String,
    #[sqlx(rename = "blob_name")]
    pub object_name: String,
    pub version_timestamp: DateTime<Utc>,

    /// Only committed segments take part in reconstruction.
    pub is_committed: bool,

    /// Block identifier assigned by the uploader.
    pub block_id: String,

    /// Path of the backing block file.
    pub file_path: String,

    /// Offset of the first byte within `file_path`.
    pub start_offset: i64,

    /// Number of bytes in this segment.
    pub length: i64,
}
