//! Backend registry handing out connections and transactions.
//!
//! # Responsibility
//! - Own one bootstrapped connection per named backend.
//! - Route entity calls to a backend by name, falling back to the default.
//!
//! # Invariants
//! - The first registered backend is the default backend.
//! - Backend names are unique.
//! - A guard or transaction keeps its backend locked until dropped.
//! - A thread asking again for a backend it already holds gets
//!   `DbError::Busy` instead of waiting on itself; other threads wait.

use super::handle::SqliteTx;
use super::open::open_with_config;
use super::{DbError, DbResult};
use crate::config::DbConfig;
use log::{debug, info, warn};
use rusqlite::Connection;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, ThreadId};

struct Backend {
    name: String,
    conn: Mutex<Connection>,
    /// Thread currently holding `conn`; set after locking, cleared before
    /// unlocking.
    holder: Mutex<Option<ThreadId>>,
}

impl Backend {
    fn set_holder(&self, holder: Option<ThreadId>) {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = holder;
    }

    fn held_by_current_thread(&self) -> bool {
        let holder = *self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        holder == Some(thread::current().id())
    }
}

/// Owned set of backend connections.
///
/// Shared between threads behind an `Arc`; every acquisition locks the
/// backend connection for the duration of one unit of work.
#[derive(Default)]
pub struct ConnectionProvider {
    backends: Vec<Backend>,
}

/// Exclusive access to one backend connection.
pub struct BackendGuard<'p> {
    backend: &'p Backend,
    conn: MutexGuard<'p, Connection>,
}

impl BackendGuard<'_> {
    pub fn backend(&self) -> &str {
        &self.backend.name
    }
}

impl Drop for BackendGuard<'_> {
    fn drop(&mut self) {
        self.backend.set_holder(None);
    }
}

impl Deref for BackendGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl ConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens and registers every config in order; the first is the default.
    pub fn from_configs(configs: &[DbConfig]) -> DbResult<Self> {
        let mut provider = Self::new();
        for config in configs {
            provider.register(config)?;
        }
        Ok(provider)
    }

    /// Provider with one in-memory default backend.
    pub fn in_memory() -> DbResult<Self> {
        Self::from_configs(&[DbConfig::default()])
    }

    /// Opens the backend described by `config` and registers it.
    pub fn register(&mut self, config: &DbConfig) -> DbResult<()> {
        let name = config.backend.trim();
        if self.position(name).is_some() {
            return Err(DbError::DuplicateBackend(name.to_string()));
        }
        let conn = open_with_config(config)?;
        self.register_connection(name, conn)
    }

    /// Registers an already opened connection under `name`.
    pub fn register_connection(&mut self, name: &str, conn: Connection) -> DbResult<()> {
        let name = name.trim();
        if self.position(name).is_some() {
            return Err(DbError::DuplicateBackend(name.to_string()));
        }
        info!(
            "event=backend_register module=db status=ok backend={name} default={}",
            self.backends.is_empty()
        );
        self.backends.push(Backend {
            name: name.to_string(),
            conn: Mutex::new(conn),
            holder: Mutex::new(None),
        });
        Ok(())
    }

    pub fn default_backend(&self) -> Option<&str> {
        self.backends.first().map(|backend| backend.name.as_str())
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends
            .iter()
            .map(|backend| backend.name.as_str())
            .collect()
    }

    /// Locks the connection selected by `hint`.
    ///
    /// Routing:
    /// - a single registered backend serves every call;
    /// - `Some(name)` selects that backend, `UnknownBackend` if absent;
    /// - `None` selects the default backend.
    ///
    /// Blocks while another thread holds the backend; fails with
    /// `DbError::Busy` when the calling thread already holds it, for example
    /// through an open session.
    pub fn acquire(&self, hint: Option<&str>) -> DbResult<BackendGuard<'_>> {
        let backend = self.resolve(hint)?;
        let conn = match backend.conn.try_lock() {
            Ok(conn) => conn,
            Err(TryLockError::WouldBlock) => {
                if backend.held_by_current_thread() {
                    warn!(
                        "event=backend_acquire module=db status=error backend={} error_code=busy",
                        backend.name
                    );
                    return Err(DbError::Busy(backend.name.clone()));
                }
                backend
                    .conn
                    .lock()
                    .map_err(|_| DbError::Poisoned(backend.name.clone()))?
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(DbError::Poisoned(backend.name.clone()));
            }
        };
        backend.set_holder(Some(thread::current().id()));
        Ok(BackendGuard { backend, conn })
    }

    /// Locks the routed backend and begins a transaction on it.
    pub fn begin(&self, hint: Option<&str>) -> DbResult<SqliteTx<BackendGuard<'_>>> {
        let guard = self.acquire(hint)?;
        debug!(
            "event=tx_begin module=db status=start backend={}",
            guard.backend()
        );
        SqliteTx::begin(guard)
    }

    fn resolve(&self, hint: Option<&str>) -> DbResult<&Backend> {
        if self.backends.len() == 1 {
            return Ok(&self.backends[0]);
        }
        match hint {
            Some(name) => {
                let name = name.trim();
                self.position(name)
                    .map(|index| &self.backends[index])
                    .ok_or_else(|| DbError::UnknownBackend(name.to_string()))
            }
            None => self.backends.first().ok_or(DbError::NoBackend),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.backends
            .iter()
            .position(|backend| backend.name == name)
    }
}
