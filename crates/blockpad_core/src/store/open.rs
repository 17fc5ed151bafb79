//! Connection bootstrap for snapshot databases.

use super::migrations::apply_migrations;
use super::StoreResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens (or creates) a snapshot file and applies pending migrations.
///
/// # Side effects
/// - Emits `store_open` events with duration and status.
pub fn open_store(path: impl AsRef<Path>) -> StoreResult<Connection> {
    bootstrap("file", || Connection::open(path))
}

/// Opens an in-memory snapshot database with the full schema.
pub fn open_store_in_memory() -> StoreResult<Connection> {
    bootstrap("memory", Connection::open_in_memory)
}

fn bootstrap(
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> StoreResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=store status=start mode={mode}");

    let result: StoreResult<Connection> = open().map_err(Into::into).and_then(|mut conn| {
        configure(&mut conn)?;
        Ok(conn)
    });
    match &result {
        Ok(_) => info!(
            "event=store_open module=store status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=store_open module=store status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn configure(conn: &mut Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)
}
