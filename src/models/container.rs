//! Represents a container, the namespace objects are resolved within.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A blob container.
///
/// The website engine only uses the container name as a lookup key; the full
/// record exists so the website container can be provisioned at startup.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Container {
    pub account_name: String,
    pub container_name: String,
    pub last_modification_time: DateTime<Utc>,
    pub service_metadata: Vec<u8>,
    pub metadata: Vec<u8>,
    pub lease_id: Option<String>,
    pub lease_state: i64,
    pub lease_duration: i64,
    pub lease_end_time: Option<DateTime<Utc>>,
    pub is_lease_op: bool,
}

impl Container {
    /// A fresh, unleased container record with the emulator's default properties.
    pub fn new(account_name: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            container_name: container_name.into(),
            last_modification_time: Utc::now(),
            service_metadata: b"SASIdentifiers:\r\n".to_vec(),
            metadata: Vec::new(),
            lease_id: None,
            lease_state: 0,
            lease_duration: 0,
            lease_end_time: None,
            is_lease_op: false,
        }
    }
}
