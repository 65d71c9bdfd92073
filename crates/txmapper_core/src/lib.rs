//! Generic data access over SQLite: zero-value-aware field selection,
//! per-entity mappers and transaction sessions with commit/rollback policy.

pub mod config;
pub mod db;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod query;
pub mod selector;
pub mod tx;
pub mod validation;

pub use rusqlite;

pub use config::{DbConfig, DbLocation, DEFAULT_BACKEND};
pub use db::{
    open_db, open_db_in_memory, open_with_config, ConnectionProvider, DbError, DbResult, SqliteTx,
    TxHandle,
};
pub use logging::{
    default_log_level, init_logging, logging_status, set_sql_log_level, SqlLogLevel,
};
pub use mapper::{Inserted, Mapper, MapperError, MapperResult, Page, PageRequest};
pub use model::entity::{ColumnMap, ColumnValue, Entity, Field};
pub use model::timestamp::Timestamp;
pub use query::{Condition, ReadOptions};
pub use selector::{non_default_columns, FieldSelector};
pub use tx::{
    Cancellation, ExecutionMode, Fetched, Operation, OperationKind, Outcome, Session, StepRecord,
    StepStatus, TransactionConfig, TxError, TxResult, TxState,
};
pub use validation::ValidationError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
