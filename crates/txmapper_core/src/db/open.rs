//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections from `DbConfig`.
//! - Configure pragmas and run the optional init batch.
//!
//! # Invariants
//! - Returned connections have the configured `foreign_keys` and busy timeout.
//! - `init_sql` runs before the connection is handed out.
//! - Double-quoted tokens are always identifiers; SQLite's string-literal
//!   fallback is disabled for DML and DDL.

use super::DbResult;
use crate::config::{DbConfig, DbLocation};
use log::{error, info};
use rusqlite::config::DbConfig as SqliteDbConfig;
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file with default settings.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with_config(&DbConfig::file(
        crate::config::DEFAULT_BACKEND,
        path.as_ref(),
    ))
}

/// Opens an in-memory SQLite database with default settings.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with_config(&DbConfig::default())
}

/// Opens and bootstraps one backend connection.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_with_config(config: &DbConfig) -> DbResult<Connection> {
    config.validate()?;

    let started_at = Instant::now();
    let mode = location_mode(&config.location);
    info!(
        "event=db_open module=db status=start backend={} mode={mode}",
        config.backend
    );

    let opened = match &config.location {
        DbLocation::Memory => Connection::open_in_memory(),
        DbLocation::File(path) => Connection::open(path),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error backend={} mode={mode} duration_ms={} error_code=db_open_failed error={}",
                config.backend,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok backend={} mode={mode} duration_ms={}",
                config.backend,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error backend={} mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                config.backend,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, config: &DbConfig) -> DbResult<()> {
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(config.busy_timeout())?;
    conn.set_db_config(SqliteDbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
    conn.set_db_config(SqliteDbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
    if let Some(sql) = config.init_sql.as_deref() {
        conn.execute_batch(sql)?;
    }
    Ok(())
}

fn location_mode(location: &DbLocation) -> &'static str {
    match location {
        DbLocation::Memory => "memory",
        DbLocation::File(_) => "file",
    }
}
