//! Transactional handle contract and its SQLite implementation.
//!
//! # Responsibility
//! - Issue BEGIN on construction and COMMIT/ROLLBACK on request.
//! - Expose the connection so queued operations can run inside the transaction.
//!
//! # Invariants
//! - COMMIT or ROLLBACK is issued at most once per handle.
//! - Dropping an open handle rolls back.

use super::{DbError, DbResult};
use log::{debug, warn};
use rusqlite::Connection;
use std::ops::Deref;

/// One live database transaction owned by a single session.
pub trait TxHandle {
    /// Connection every operation of the transaction runs on.
    fn connection(&self) -> &Connection;
    fn commit(&mut self) -> DbResult<()>;
    fn rollback(&mut self) -> DbResult<()>;
}

/// SQLite transaction over a borrowed or guarded connection.
///
/// `C` is anything that derefs to a connection: a plain `&Connection`, or
/// the backend guard returned by `ConnectionProvider`.
pub struct SqliteTx<C: Deref<Target = Connection>> {
    conn: C,
    open: bool,
}

impl<C: Deref<Target = Connection>> SqliteTx<C> {
    /// Starts a deferred transaction on `conn`.
    pub fn begin(conn: C) -> DbResult<Self> {
        conn.execute_batch("BEGIN DEFERRED;")?;
        debug!("event=tx_begin module=db status=ok");
        Ok(Self { conn, open: true })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl<C: Deref<Target = Connection>> TxHandle for SqliteTx<C> {
    fn connection(&self) -> &Connection {
        &self.conn
    }

    fn commit(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::Closed);
        }
        self.conn.execute_batch("COMMIT;")?;
        self.open = false;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::Closed);
        }
        // A failed COMMIT can leave SQLite with the transaction already
        // closed; ROLLBACK then reports "no transaction is active".
        let result = if self.conn.is_autocommit() {
            Ok(())
        } else {
            self.conn.execute_batch("ROLLBACK;")
        };
        self.open = false;
        result.map_err(DbError::from)
    }
}

impl<C: Deref<Target = Connection>> Drop for SqliteTx<C> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = self.rollback() {
            warn!("event=tx_rollback module=db status=error trigger=drop error={err}");
        } else {
            debug!("event=tx_rollback module=db status=ok trigger=drop");
        }
    }
}
