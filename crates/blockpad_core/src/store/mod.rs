//! SQLite document snapshots (`.docv`).
//!
//! # Responsibility
//! - Open and migrate snapshot databases.
//! - Store and restore a complete document, block ids included.
//!
//! # Invariants
//! - Connections returned by `open_store` have `foreign_keys=ON` and the
//!   schema fully migrated.
//! - A save replaces the stored document in one transaction.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod snapshot;

pub use open::{open_store, open_store_in_memory};
pub use snapshot::{export_snapshot, import_snapshot, load_snapshot, save_snapshot};

/// File extension of snapshot databases, without the dot.
pub const SNAPSHOT_EXTENSION: &str = "docv";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Stored rows do not form a valid document.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "snapshot schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidData(message) => write!(f, "invalid snapshot data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
