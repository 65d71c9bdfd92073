//! Entity reflection contracts.
//!
//! # Responsibility
//! - Describe how a struct maps to one table: name, key, backend, columns.
//! - Expose every field with its column, SQL value and "set" flag.
//!
//! # Invariants
//! - `Entity::fields()` returns fields in declaration order.
//! - A field is unset exactly when it holds the zero value of its type;
//!   `Option<T>` fields are unset exactly when `None`, and a `Timestamp`
//!   is unset at the zero time.

use rusqlite::types::{FromSql, Value};
use rusqlite::Row;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Literal column/value pairs. Map-based filters and writes honor zero values.
pub type ColumnMap = BTreeMap<String, Value>;

/// Conversion of one field into an SQL value plus its zero-value check.
pub trait ColumnValue {
    fn to_value(&self) -> Value;
    /// True when the field holds the zero value of its type.
    fn is_unset(&self) -> bool;
}

macro_rules! integer_column_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn is_unset(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

integer_column_value!(i8, i16, i32, i64, u8, u16, u32);

impl ColumnValue for bool {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn is_unset(&self) -> bool {
        !*self
    }
}

impl ColumnValue for f64 {
    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn is_unset(&self) -> bool {
        *self == 0.0
    }
}

impl ColumnValue for f32 {
    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    fn is_unset(&self) -> bool {
        *self == 0.0
    }
}

impl ColumnValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl ColumnValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl ColumnValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Blob(self.as_bytes().to_vec())
    }

    fn is_unset(&self) -> bool {
        self.is_nil()
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

/// One reflected entity field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub column: &'static str,
    pub value: Value,
    pub is_set: bool,
}

impl Field {
    pub fn new<V: ColumnValue + ?Sized>(column: &'static str, value: &V) -> Self {
        Self {
            column,
            value: value.to_value(),
            is_set: !value.is_unset(),
        }
    }
}

/// Primary key types and how they take a database generated row id.
///
/// Client generated keys (`Uuid`, `String`) ignore the row id.
pub trait GeneratedKey {
    fn assign_row_id(&mut self, row_id: i64);
}

impl GeneratedKey for i64 {
    fn assign_row_id(&mut self, row_id: i64) {
        *self = row_id;
    }
}

impl GeneratedKey for Option<i64> {
    fn assign_row_id(&mut self, row_id: i64) {
        *self = Some(row_id);
    }
}

impl GeneratedKey for Uuid {
    fn assign_row_id(&mut self, _row_id: i64) {}
}

impl GeneratedKey for String {
    fn assign_row_id(&mut self, _row_id: i64) {}
}

/// Struct mapped to one table.
///
/// Usually implemented through [`impl_entity!`](crate::impl_entity).
pub trait Entity: Sized {
    fn table_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Backend routing hint for multi-backend providers.
    fn backend() -> Option<&'static str> {
        None
    }

    /// Column names in declaration order.
    fn columns() -> &'static [&'static str];

    /// Every field in declaration order.
    fn fields(&self) -> Vec<Field>;

    /// Decodes one row; columns missing from a projection decode to default.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Stores a generated row id into the primary key field.
    fn assign_generated_key(&mut self, row_id: i64);

    /// Primary key field of this value.
    fn key_field(&self) -> Option<Field> {
        self.fields()
            .into_iter()
            .find(|field| field.column == Self::primary_key())
    }
}

/// Reads `column`, falling back to the default value when the statement did
/// not project it.
pub fn decode_column<V: FromSql + Default>(row: &Row<'_>, column: &str) -> rusqlite::Result<V> {
    match row.get::<_, V>(column) {
        Err(rusqlite::Error::InvalidColumnName(_)) => Ok(V::default()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnValue, Field};
    use rusqlite::types::Value;
    use uuid::Uuid;

    #[test]
    fn zero_values_are_unset() {
        assert!(0_i64.is_unset());
        assert!(0_u32.is_unset());
        assert!(false.is_unset());
        assert!(0.0_f64.is_unset());
        assert!(String::new().is_unset());
        assert!(Vec::<u8>::new().is_unset());
        assert!(Uuid::nil().is_unset());
        assert!(None::<i64>.is_unset());
    }

    #[test]
    fn option_some_zero_is_set() {
        let field = Field::new("sex", &Some(0_u8));
        assert!(field.is_set);
        assert_eq!(field.value, Value::Integer(0));
    }

    #[test]
    fn none_maps_to_null() {
        let field = Field::new("nickname", &None::<String>);
        assert!(!field.is_set);
        assert_eq!(field.value, Value::Null);
    }
}
