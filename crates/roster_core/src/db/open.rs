//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open the store described by a `StoreConfig`.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Configuration is validated before any file is touched.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::{StoreConfig, StoreTarget};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Opens the configured store and applies all pending migrations.
///
/// # Errors
/// - `DbError::Config` when the configuration is invalid; nothing is opened.
/// - `DbError::Sqlite` when the target cannot be opened or configured.
/// - `DbError::UnsupportedSchemaVersion` for databases from a newer build.
pub fn open_db(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = match config.target {
        StoreTarget::File { .. } => "file",
        StoreTarget::Memory => "memory",
    };

    if let Err(err) = config.validate() {
        error!(
            "event=db_open module=db status=error mode={} error_code=invalid_config error={}",
            mode, err
        );
        return Err(err.into());
    }
    info!("event=db_open module=db status=start mode={}", mode);

    let opened = match &config.target {
        StoreTarget::File { path } => Connection::open(path),
        StoreTarget::Memory => Connection::open_in_memory(),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens a migrated in-memory store with default settings.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_db(&StoreConfig::in_memory())
}

fn bootstrap_connection(conn: &mut Connection, config: &StoreConfig) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", config.enforce_foreign_keys)?;
    conn.busy_timeout(config.busy_timeout())?;
    apply_migrations(conn)?;
    Ok(())
}
