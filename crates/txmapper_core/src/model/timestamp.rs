//! Nullable point-in-time column.
//!
//! # Responsibility
//! - Carry Unix epoch milliseconds through entities and SQL values.
//!
//! # Invariants
//! - `Timestamp(0)` is the zero time: unset, stored as `NULL`.
//! - `NULL` reads back as the zero time.

use super::entity::ColumnValue;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds; zero means "no time".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time; the zero time if the clock is before 1970.
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
            .map_or(Self::ZERO, Self)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl ColumnValue for Timestamp {
    fn to_value(&self) -> Value {
        if self.is_zero() {
            Value::Null
        } else {
            Value::Integer(self.0)
        }
    }

    fn is_unset(&self) -> bool {
        self.is_zero()
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.to_value()))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::ZERO),
            ValueRef::Integer(millis) => Ok(Self(millis)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
