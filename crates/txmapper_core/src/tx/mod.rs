//! Transaction sessions over mapper operations.
//!
//! # Responsibility
//! - Run an ordered chain of mapper operations inside one database
//!   transaction, either queued until `execute` (deferred) or run as they
//!   are added (immediate).
//! - Decide COMMIT or ROLLBACK from step outcomes and the zero-rows policy.
//!
//! # Invariants
//! - Steps run strictly in caller order on the session's handle.
//! - Once a session stops being committable it never becomes committable
//!   again, and no later step closure is invoked.
//! - COMMIT or ROLLBACK is issued at most once per session.

mod config;
mod operation;
mod session;

pub use config::{Cancellation, ExecutionMode, TransactionConfig};
pub use operation::{Fetched, Operation, OperationKind, Outcome, StepRecord, StepStatus};
pub use session::{Session, TxState};

use crate::db::DbError;
use crate::mapper::MapperError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TxResult<T> = Result<T, TxError>;

/// Why a session did not commit.
///
/// Every variant except `NoOperationsQueued` and `BeginFailed` means the
/// session ended rolled back.
#[derive(Debug)]
pub enum TxError {
    /// Deferred session executed with an empty queue; the handle is untouched.
    NoOperationsQueued,
    BeginFailed { cause: DbError },
    /// Step `index` returned an error.
    StepFailed { index: usize, cause: MapperError },
    /// Step `index` was a write that affected no row while zero rows are
    /// disallowed.
    ZeroRowsPolicyViolation { index: usize },
    /// Cancellation was observed before step `index`.
    Cancelled { index: usize },
    CommitFailed { cause: DbError },
    RollbackFailed { cause: DbError },
}

impl TxError {
    /// Index of the step that aborted the chain, if a step did.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::StepFailed { index, .. }
            | Self::ZeroRowsPolicyViolation { index }
            | Self::Cancelled { index } => Some(*index),
            Self::NoOperationsQueued
            | Self::BeginFailed { .. }
            | Self::CommitFailed { .. }
            | Self::RollbackFailed { .. } => None,
        }
    }
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOperationsQueued => write!(f, "no operation queued"),
            Self::BeginFailed { cause } => write!(f, "failed to begin transaction: {cause}"),
            Self::StepFailed { index, cause } => write!(f, "step {index} failed: {cause}"),
            Self::ZeroRowsPolicyViolation { index } => {
                write!(f, "step {index} affected no row")
            }
            Self::Cancelled { index } => write!(f, "cancelled before step {index}"),
            Self::CommitFailed { cause } => write!(f, "commit failed: {cause}"),
            Self::RollbackFailed { cause } => write!(f, "rollback failed: {cause}"),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StepFailed { cause, .. } => Some(cause),
            Self::BeginFailed { cause }
            | Self::CommitFailed { cause }
            | Self::RollbackFailed { cause } => Some(cause),
            Self::NoOperationsQueued
            | Self::ZeroRowsPolicyViolation { .. }
            | Self::Cancelled { .. } => None,
        }
    }
}
