use super::{Mapper, MapperResult};
use crate::model::entity::{ColumnMap, ColumnValue, Entity, Field};
use crate::query::{self, Condition, Statement};
use crate::selector::{set_fields, FieldSelector};
use crate::validation::{declared_column, ValidationError};
use log::warn;
use rusqlite::types::Value;
use rusqlite::Connection;

const BATCH_SAVEPOINT: &str = "txmapper_batch";

/// Outcome of one insert statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub rows: u64,
    /// Row id assigned by the database when the key column was not written.
    pub generated_key: Option<i64>,
}

impl<T: Entity> Mapper<'_, T> {
    /// Inserts every field except `exclude`.
    ///
    /// An unset primary key is left to the database and the generated key is
    /// written back into `entity`.
    pub fn insert(&self, entity: &mut T, exclude: &[&str]) -> MapperResult<u64> {
        Ok(self.insert_returning(entity, exclude)?.rows)
    }

    pub fn insert_returning(&self, entity: &mut T, exclude: &[&str]) -> MapperResult<Inserted> {
        let prepared = insert_statement::<T>(insert_fields(&*entity, exclude), false)?;
        self.insert_one(entity, &prepared)
    }

    /// Inserts only set fields plus `always_include`.
    pub fn insert_without_zero_field(
        &self,
        entity: &mut T,
        always_include: &[&str],
    ) -> MapperResult<u64> {
        let columns = FieldSelector::new()
            .always_include(always_include)
            .select_required(&*entity)?;
        let prepared = insert_statement::<T>(pick_fields(&*entity, &columns), false)?;
        Ok(self.insert_one(entity, &prepared)?.rows)
    }

    /// Inserts all entities or none of them.
    pub fn insert_batch(&self, entities: &mut [T], exclude: &[&str]) -> MapperResult<u64> {
        if entities.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let batch = entities
            .iter()
            .map(|entity| insert_statement::<T>(insert_fields(entity, exclude), false))
            .collect::<MapperResult<Vec<_>>>()?;

        let reports = self.run(|conn| insert_all(conn, &batch))?;
        for (entity, report) in entities.iter_mut().zip(&reports) {
            if let Some(row_id) = report.generated_key {
                entity.assign_generated_key(row_id);
            }
        }
        Ok(reports.iter().map(|report| report.rows).sum())
    }

    pub fn insert_map(&self, values: &ColumnMap) -> MapperResult<u64> {
        let (columns, params) = split_map::<T>(values, None)?;
        let statement = query::insert(T::table_name(), &columns, params)?;
        self.run(|conn| Ok(query::execute(conn, &statement)?))
    }

    /// Inserts, or updates every written non-key column when the primary key
    /// already exists. Excluded columns are neither inserted nor updated.
    pub fn insert_or_update_by_key(&self, entity: &mut T, exclude: &[&str]) -> MapperResult<u64> {
        Ok(self.upsert_returning(entity, exclude)?.rows)
    }

    pub fn upsert_returning(&self, entity: &mut T, exclude: &[&str]) -> MapperResult<Inserted> {
        let prepared = insert_statement::<T>(insert_fields(&*entity, exclude), true)?;
        self.insert_one(entity, &prepared)
    }

    /// Updates `columns` (zero values included) of the row keyed by `entity`;
    /// an empty list updates the set fields only.
    pub fn update_by_id(&self, entity: &T, columns: &[&str]) -> MapperResult<u64> {
        let condition = key_condition(entity)?;
        let fields = if columns.is_empty() {
            set_fields(entity, &[T::primary_key()])
        } else {
            explicit_fields(entity, columns)?
        };
        self.update_fields(fields, &condition)
    }

    /// Updates set fields plus `always_include` of the row keyed by `entity`.
    pub fn update_by_id_without_zero_field(
        &self,
        entity: &T,
        always_include: &[&str],
    ) -> MapperResult<u64> {
        let condition = key_condition(entity)?;
        let exclude = [T::primary_key()];
        let columns = FieldSelector::new()
            .always_include(always_include)
            .exclude(&exclude)
            .select_required(entity)?;
        self.update_fields(pick_fields(entity, &columns), &condition)
    }

    pub fn update_by_id_map<K: ColumnValue + ?Sized>(
        &self,
        id: &K,
        values: &ColumnMap,
    ) -> MapperResult<u64> {
        if id.is_unset() {
            return Err(ValidationError::MissingPrimaryKey.into());
        }
        let condition = Condition::by_key(T::primary_key(), id.to_value());
        self.update_map(values, &condition)
    }

    /// Writes the set fields of `values` into rows matching `filter`.
    pub fn update_by_condition(&self, values: &T, filter: &T) -> MapperResult<u64> {
        let fields = set_fields(values, &[T::primary_key()]);
        self.update_fields(fields, &Condition::from_entity(filter))
    }

    /// Writes `columns` of `values`, zero values included, into rows matching
    /// `filter`.
    pub fn update_by_condition_with_zero_field(
        &self,
        values: &T,
        columns: &[&str],
        filter: &T,
    ) -> MapperResult<u64> {
        let fields = explicit_fields(values, columns)?;
        self.update_fields(fields, &Condition::from_entity(filter))
    }

    pub fn update_by_map(&self, values: &ColumnMap, filter: &ColumnMap) -> MapperResult<u64> {
        self.update_map(values, &Condition::from_map::<T>(filter)?)
    }

    pub fn update_by_where(
        &self,
        values: &ColumnMap,
        predicate: &str,
        args: Vec<Value>,
    ) -> MapperResult<u64> {
        self.update_map(values, &Condition::raw(predicate, args))
    }

    /// Deletes the row keyed by `id`; an unset key is `MissingPrimaryKey`.
    pub fn delete_by_id<K: ColumnValue + ?Sized>(&self, id: &K) -> MapperResult<u64> {
        if id.is_unset() {
            return Err(ValidationError::MissingPrimaryKey.into());
        }
        self.delete(&Condition::by_key(T::primary_key(), id.to_value()))
    }

    pub fn delete_by_ids<K: ColumnValue>(&self, ids: &[K]) -> MapperResult<u64> {
        let values = ids.iter().map(ColumnValue::to_value).collect();
        self.delete(&Condition::by_keys(T::primary_key(), values))
    }

    pub fn delete_by_condition(&self, filter: &T) -> MapperResult<u64> {
        self.delete(&Condition::from_entity(filter))
    }

    pub fn delete_by_map(&self, filter: &ColumnMap) -> MapperResult<u64> {
        self.delete(&Condition::from_map::<T>(filter)?)
    }

    pub fn delete_by_where(&self, predicate: &str, args: Vec<Value>) -> MapperResult<u64> {
        self.delete(&Condition::raw(predicate, args))
    }

    pub fn delete(&self, condition: &Condition) -> MapperResult<u64> {
        let statement = query::delete(T::table_name(), condition)?;
        self.run(|conn| Ok(query::execute(conn, &statement)?))
    }

    fn insert_one(&self, entity: &mut T, prepared: &PreparedInsert) -> MapperResult<Inserted> {
        let inserted = self.run(|conn| insert_on(conn, prepared))?;
        if let Some(row_id) = inserted.generated_key {
            entity.assign_generated_key(row_id);
        }
        Ok(inserted)
    }

    fn update_fields(&self, fields: Vec<Field>, condition: &Condition) -> MapperResult<u64> {
        let assignments = fields
            .into_iter()
            .map(|field| (field.column, field.value))
            .collect();
        let statement = query::update(T::table_name(), assignments, condition)?;
        self.run(|conn| Ok(query::execute(conn, &statement)?))
    }

    fn update_map(&self, values: &ColumnMap, condition: &Condition) -> MapperResult<u64> {
        let (columns, params) = split_map::<T>(values, Some(T::primary_key()))?;
        let assignments = columns.into_iter().zip(params).collect();
        let statement = query::update(T::table_name(), assignments, condition)?;
        self.run(|conn| Ok(query::execute(conn, &statement)?))
    }
}

struct PreparedInsert {
    statement: Statement,
    key_written: bool,
}

fn insert_statement<T: Entity>(fields: Vec<Field>, upsert: bool) -> MapperResult<PreparedInsert> {
    let key_written = fields
        .iter()
        .any(|field| field.column == T::primary_key());
    let columns: Vec<&str> = fields.iter().map(|field| field.column).collect();
    let values = fields.into_iter().map(|field| field.value).collect();
    let statement = if upsert {
        query::upsert(T::table_name(), T::primary_key(), &columns, values)?
    } else {
        query::insert(T::table_name(), &columns, values)?
    };
    Ok(PreparedInsert {
        statement,
        key_written,
    })
}

fn insert_on(conn: &Connection, prepared: &PreparedInsert) -> MapperResult<Inserted> {
    let rows = query::execute(conn, &prepared.statement)?;
    let generated_key = (rows > 0 && !prepared.key_written).then(|| conn.last_insert_rowid());
    Ok(Inserted {
        rows,
        generated_key,
    })
}

fn insert_all(conn: &Connection, batch: &[PreparedInsert]) -> MapperResult<Vec<Inserted>> {
    conn.execute_batch(&format!("SAVEPOINT {BATCH_SAVEPOINT};"))?;
    let mut reports = Vec::with_capacity(batch.len());
    for prepared in batch {
        match insert_on(conn, prepared) {
            Ok(report) => reports.push(report),
            Err(err) => {
                let undo = format!(
                    "ROLLBACK TO {BATCH_SAVEPOINT}; RELEASE {BATCH_SAVEPOINT};"
                );
                if let Err(undo_err) = conn.execute_batch(&undo) {
                    warn!(
                        "event=batch_rollback module=mapper status=error rows={} error={undo_err}",
                        reports.len()
                    );
                }
                return Err(err);
            }
        }
    }
    conn.execute_batch(&format!("RELEASE {BATCH_SAVEPOINT};"))?;
    Ok(reports)
}

/// Every field minus `exclude`; an unset key is dropped.
fn insert_fields<T: Entity>(entity: &T, exclude: &[&str]) -> Vec<Field> {
    entity
        .fields()
        .into_iter()
        .filter(|field| !exclude.contains(&field.column))
        .filter(|field| field.is_set || field.column != T::primary_key())
        .collect()
}

/// Fields of `entity` in `columns` order.
fn pick_fields<T: Entity>(entity: &T, columns: &[&'static str]) -> Vec<Field> {
    let mut fields = entity.fields();
    columns
        .iter()
        .filter_map(|column| {
            let index = fields.iter().position(|field| field.column == *column)?;
            Some(fields.swap_remove(index))
        })
        .collect()
}

/// Caller-named columns of `entity`, zero values included, key skipped.
fn explicit_fields<T: Entity>(entity: &T, columns: &[&str]) -> MapperResult<Vec<Field>> {
    let mut selected: Vec<&'static str> = Vec::with_capacity(columns.len());
    for requested in columns {
        let declared = declared_column(T::columns(), requested)?;
        if declared != T::primary_key() && !selected.contains(&declared) {
            selected.push(declared);
        }
    }
    Ok(pick_fields(entity, &selected))
}

fn key_condition<T: Entity>(entity: &T) -> MapperResult<Condition> {
    match entity.key_field() {
        Some(key) if key.is_set => Ok(Condition::by_key(T::primary_key(), key.value)),
        _ => Err(ValidationError::MissingPrimaryKey.into()),
    }
}

/// Declared columns and values of `values`, minus `skip`.
fn split_map<T: Entity>(
    values: &ColumnMap,
    skip: Option<&str>,
) -> MapperResult<(Vec<&'static str>, Vec<Value>)> {
    let mut columns = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (column, value) in values {
        let declared = declared_column(T::columns(), column)?;
        if Some(declared) != skip {
            columns.push(declared);
            params.push(value.clone());
        }
    }
    Ok((columns, params))
}
