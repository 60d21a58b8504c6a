//! Catalog records for the static website emulator.
//!
//! These entities mirror the rows the storage emulator keeps for containers,
//! blobs and their committed blocks. They map onto the catalog tables via
//! `sqlx::FromRow` and serialize as JSON via `serde` for diagnostics.

pub mod container;
pub mod object;
pub mod segment;
