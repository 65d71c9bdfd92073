//! SQLite connection bootstrap, backend routing and transactional handles.
//!
//! # Responsibility
//! - Open and configure SQLite connections from `DbConfig`.
//! - Own per-backend connections and hand them out to mappers and sessions.
//! - Wrap BEGIN/COMMIT/ROLLBACK behind the `TxHandle` contract.
//!
//! # Invariants
//! - No process-global connection state; callers pass a `ConnectionProvider`
//!   or a borrowed connection down explicitly.
//! - A transactional handle that is dropped while open rolls back.

use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod handle;
mod open;
mod provider;

pub use handle::{SqliteTx, TxHandle};
pub use open::{open_db, open_db_in_memory, open_with_config};
pub use provider::{BackendGuard, ConnectionProvider};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Config(ConfigError),
    /// No backend registered under the requested name.
    UnknownBackend(String),
    /// A backend with the same name was already registered.
    DuplicateBackend(String),
    /// Provider has no backend registered at all.
    NoBackend,
    /// A thread panicked while holding the backend connection.
    Poisoned(String),
    /// The calling thread already holds this backend's connection.
    Busy(String),
    /// Handle was already committed or rolled back.
    Closed,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "invalid database config: {err}"),
            Self::UnknownBackend(name) => write!(f, "backend not registered: {name}"),
            Self::DuplicateBackend(name) => write!(f, "backend already registered: {name}"),
            Self::NoBackend => write!(f, "connection provider has no backend"),
            Self::Poisoned(name) => write!(f, "backend connection lock poisoned: {name}"),
            Self::Busy(name) => {
                write!(f, "backend connection already held by this thread: {name}")
            }
            Self::Closed => write!(f, "transaction handle already closed"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::UnknownBackend(_) => None,
            Self::DuplicateBackend(_) => None,
            Self::NoBackend => None,
            Self::Poisoned(_) => None,
            Self::Busy(_) => None,
            Self::Closed => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ConfigError> for DbError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
