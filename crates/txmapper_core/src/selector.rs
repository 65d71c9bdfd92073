//! Zero-value-aware column selection.
//!
//! # Responsibility
//! - Resolve which columns of an entity a partial write or struct filter
//!   touches: set fields in declaration order plus caller overrides.
//!
//! # Invariants
//! - Output is duplicate-free; auto-detected columns keep declaration order,
//!   overrides follow in caller order.
//! - Pure: no I/O and no shared state.

use crate::model::entity::{Entity, Field};
use crate::validation::{declared_column, ValidationError};

/// Column selection rules for one write or filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSelector<'s> {
    always_include: &'s [&'s str],
    exclude: &'s [&'s str],
}

impl<'s> FieldSelector<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns written even when they hold a zero value.
    pub fn always_include(mut self, columns: &'s [&'s str]) -> Self {
        self.always_include = columns;
        self
    }

    /// Columns never selected, neither auto-detected nor overridden.
    pub fn exclude(mut self, columns: &'s [&'s str]) -> Self {
        self.exclude = columns;
        self
    }

    /// Resolves the column list; may be empty.
    pub fn select<T: Entity>(&self, entity: &T) -> Result<Vec<&'static str>, ValidationError> {
        let fields = entity.fields();
        let mut columns: Vec<&'static str> = Vec::with_capacity(fields.len());

        for field in fields.iter().filter(|field| field.is_set) {
            if !self.is_excluded(field.column) && !columns.contains(&field.column) {
                columns.push(field.column);
            }
        }

        for requested in self.always_include {
            let declared = declared_column(T::columns(), requested)?;
            if !self.is_excluded(declared) && !columns.contains(&declared) {
                columns.push(declared);
            }
        }

        Ok(columns)
    }

    /// Like [`select`](Self::select), failing with `EmptyProjection` when
    /// nothing is selected.
    pub fn select_required<T: Entity>(
        &self,
        entity: &T,
    ) -> Result<Vec<&'static str>, ValidationError> {
        let columns = self.select(entity)?;
        if columns.is_empty() {
            return Err(ValidationError::EmptyProjection);
        }
        Ok(columns)
    }

    fn is_excluded(&self, column: &str) -> bool {
        self.exclude.iter().any(|excluded| *excluded == column)
    }
}

/// Set columns of `entity` in declaration order.
pub fn non_default_columns<T: Entity>(entity: &T) -> Vec<&'static str> {
    entity
        .fields()
        .into_iter()
        .filter(|field| field.is_set)
        .map(|field| field.column)
        .collect()
}

/// Set fields of `entity` paired with their values, for struct filters.
pub(crate) fn set_fields<T: Entity>(entity: &T, exclude: &[&str]) -> Vec<Field> {
    entity
        .fields()
        .into_iter()
        .filter(|field| field.is_set && !exclude.contains(&field.column))
        .collect()
}
