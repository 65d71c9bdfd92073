//! Per-entity CRUD facade.
//!
//! # Responsibility
//! - Offer select/count/page/insert/update/delete calls for one entity type.
//! - Build filters and partial writes through `FieldSelector` and `Condition`.
//! - Run either auto-committed through a `ConnectionProvider` or bound to a
//!   borrowed connection inside a transaction.
//!
//! # Invariants
//! - Caller input is validated before any statement is issued.
//! - Updates never write the primary key column.
//! - Updates and deletes always carry a predicate.
//! - Driver errors surface verbatim; nothing is retried.

mod page;
mod read;
mod write;

pub use page::{Page, PageRequest};
pub use write::Inserted;

use crate::db::{ConnectionProvider, DbError};
use crate::model::entity::Entity;
use crate::validation::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type MapperResult<T> = Result<T, MapperError>;

#[derive(Debug)]
pub enum MapperError {
    Validation(ValidationError),
    Db(DbError),
}

impl Display for MapperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MapperError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<ValidationError> for MapperError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for MapperError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for MapperError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Clone, Copy)]
enum Binding<'a> {
    /// Each call locks the routed backend and auto-commits.
    Provider(&'a ConnectionProvider),
    /// Every call runs on this connection, usually inside a transaction.
    Connection(&'a Connection),
}

/// CRUD access to the table of `T`.
pub struct Mapper<'a, T> {
    binding: Binding<'a>,
    entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Mapper<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Mapper<'_, T> {}

impl<'a, T: Entity> Mapper<'a, T> {
    /// Unbound mapper; calls route by `T::backend()`.
    pub fn new(provider: &'a ConnectionProvider) -> Self {
        Self {
            binding: Binding::Provider(provider),
            entity: PhantomData,
        }
    }

    /// Mapper bound to one connection, for use inside a transaction.
    pub fn with_connection(conn: &'a Connection) -> Self {
        Self {
            binding: Binding::Connection(conn),
            entity: PhantomData,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Connection(_))
    }

    fn run<R>(&self, op: impl FnOnce(&Connection) -> MapperResult<R>) -> MapperResult<R> {
        match self.binding {
            Binding::Provider(provider) => {
                let guard = provider.acquire(T::backend())?;
                op(&guard)
            }
            Binding::Connection(conn) => op(conn),
        }
    }
}
