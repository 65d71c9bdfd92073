//! Row filters for reads, updates and deletes.

use crate::model::entity::{ColumnMap, Entity};
use crate::selector::set_fields;
use crate::validation::{declared_column, quote_ident, ValidationError};
use rusqlite::types::Value;

/// Filter applied to one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No predicate.
    All,
    /// `col = ?` terms joined by AND; `Null` values compare with `IS NULL`.
    Columns(Vec<(String, Value)>),
    /// Caller-written predicate with positional `?` arguments.
    Raw { predicate: String, args: Vec<Value> },
}

impl Condition {
    /// Equality on every set field of `entity`; unset fields are omitted.
    pub fn from_entity<T: Entity>(entity: &T) -> Self {
        let terms: Vec<(String, Value)> = set_fields(entity, &[])
            .into_iter()
            .map(|field| (field.column.to_string(), field.value))
            .collect();
        if terms.is_empty() {
            Self::All
        } else {
            Self::Columns(terms)
        }
    }

    /// Equality on every map entry, zero values included.
    ///
    /// Keys must be columns declared by `T`.
    pub fn from_map<T: Entity>(map: &ColumnMap) -> Result<Self, ValidationError> {
        if map.is_empty() {
            return Ok(Self::All);
        }
        let mut terms = Vec::with_capacity(map.len());
        for (column, value) in map {
            let declared = declared_column(T::columns(), column)?;
            terms.push((declared.to_string(), value.clone()));
        }
        Ok(Self::Columns(terms))
    }

    pub fn raw(predicate: impl Into<String>, args: Vec<Value>) -> Self {
        let predicate = predicate.into();
        if predicate.trim().is_empty() {
            Self::All
        } else {
            Self::Raw { predicate, args }
        }
    }

    pub fn by_key(column: &str, value: Value) -> Self {
        Self::Columns(vec![(column.to_string(), value)])
    }

    /// `column IN (...)`; an empty id list matches nothing.
    pub fn by_keys(column: &str, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Self::raw("0 = 1", Vec::new());
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        Self::Raw {
            predicate: format!("{} IN ({placeholders})", quote_ident(column)),
            args: values,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Renders ` WHERE ...` (empty for `All`) and appends bound values.
    pub(crate) fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::All => String::new(),
            Self::Columns(terms) => {
                let rendered: Vec<String> = terms
                    .iter()
                    .map(|(column, value)| {
                        if matches!(value, Value::Null) {
                            format!("{} IS NULL", quote_ident(column))
                        } else {
                            params.push(value.clone());
                            format!("{} = ?", quote_ident(column))
                        }
                    })
                    .collect();
                format!(" WHERE {}", rendered.join(" AND "))
            }
            Self::Raw { predicate, args } => {
                params.extend(args.iter().cloned());
                format!(" WHERE ({predicate})")
            }
        }
    }
}
