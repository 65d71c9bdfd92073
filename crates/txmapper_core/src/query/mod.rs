//! SQL statement building and execution.
//!
//! # Responsibility
//! - Turn table + filter + projection + statement kind into parameterized SQL.
//! - Execute statements on a borrowed connection and report rows.
//!
//! # Invariants
//! - Identifiers are validated and quoted; values are always bound.
//! - Updates and deletes never run without a predicate.
//! - Every execution emits one `sql_exec` trace line.

mod condition;

pub use condition::Condition;

use crate::db::DbResult;
use crate::logging::trace_sql;
use crate::model::entity::Entity;
use crate::validation::{declared_column, order_by_sql, quote_ident, validate_column, ValidationError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

/// Parameterized SQL ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Read modifiers shared by every select.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions<'o> {
    /// `"col [asc|desc], ..."`.
    pub order_by: Option<&'o str>,
    /// Projected columns; empty selects every column.
    pub columns: &'o [&'o str],
}

impl<'o> ReadOptions<'o> {
    pub fn ordered(order_by: &'o str) -> Self {
        Self {
            order_by: Some(order_by),
            columns: &[],
        }
    }

    pub fn columns(mut self, columns: &'o [&'o str]) -> Self {
        self.columns = columns;
        self
    }
}

/// `LIMIT` / `OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// `declared` lists the table columns projections and order terms may name.
pub fn select(
    table: &str,
    declared: &[&'static str],
    condition: &Condition,
    options: &ReadOptions<'_>,
    window: Option<Window>,
) -> Result<Statement, ValidationError> {
    let projection = if options.columns.is_empty() {
        "*".to_string()
    } else {
        let projected = options
            .columns
            .iter()
            .map(|column| declared_column(declared, column))
            .collect::<Result<Vec<_>, _>>()?;
        quoted_list(&projected)?
    };
    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT {projection} FROM {}{}",
        quote_table(table)?,
        condition.render(&mut params)
    );
    if let Some(order_by) = options.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by_sql(order_by, declared)?);
    }
    if let Some(window) = window {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(window.limit));
        params.push(Value::Integer(window.offset));
    }
    Ok(Statement {
        kind: StatementKind::Select,
        sql,
        params,
    })
}

pub fn count(table: &str, condition: &Condition) -> Result<Statement, ValidationError> {
    let mut params = Vec::new();
    let sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        quote_table(table)?,
        condition.render(&mut params)
    );
    Ok(Statement {
        kind: StatementKind::Count,
        sql,
        params,
    })
}

pub fn insert(
    table: &str,
    columns: &[&str],
    values: Vec<Value>,
) -> Result<Statement, ValidationError> {
    if columns.is_empty() {
        return Err(ValidationError::EmptyProjection);
    }
    Ok(Statement {
        kind: StatementKind::Insert,
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_table(table)?,
            quoted_list(columns)?,
            placeholders(columns.len())
        ),
        params: values,
    })
}

/// Insert that updates the conflicting row when `key` already exists.
///
/// Only a primary-key conflict triggers the update branch.
pub fn upsert(
    table: &str,
    key: &str,
    columns: &[&str],
    values: Vec<Value>,
) -> Result<Statement, ValidationError> {
    let mut statement = insert(table, columns, values)?;
    if !columns.contains(&key) {
        return Ok(statement);
    }
    let assignments: Vec<String> = columns
        .iter()
        .filter(|column| **column != key)
        .map(|column| {
            let quoted = quote_ident(column);
            format!("{quoted} = excluded.{quoted}")
        })
        .collect();
    let action = if assignments.is_empty() {
        "NOTHING".to_string()
    } else {
        format!("UPDATE SET {}", assignments.join(", "))
    };
    statement.sql.push_str(&format!(
        " ON CONFLICT ({}) DO {action}",
        quote_ident(key)
    ));
    Ok(statement)
}

pub fn update(
    table: &str,
    assignments: Vec<(&str, Value)>,
    condition: &Condition,
) -> Result<Statement, ValidationError> {
    if assignments.is_empty() {
        return Err(ValidationError::EmptyProjection);
    }
    if condition.is_all() {
        return Err(ValidationError::MissingCondition);
    }
    let mut params = Vec::with_capacity(assignments.len());
    let mut set_terms = Vec::with_capacity(assignments.len());
    for (column, value) in assignments {
        validate_column(column)?;
        set_terms.push(format!("{} = ?", quote_ident(column)));
        params.push(value);
    }
    let sql = format!(
        "UPDATE {} SET {}{}",
        quote_table(table)?,
        set_terms.join(", "),
        condition.render(&mut params)
    );
    Ok(Statement {
        kind: StatementKind::Update,
        sql,
        params,
    })
}

pub fn delete(table: &str, condition: &Condition) -> Result<Statement, ValidationError> {
    if condition.is_all() {
        return Err(ValidationError::MissingCondition);
    }
    let mut params = Vec::new();
    let sql = format!(
        "DELETE FROM {}{}",
        quote_table(table)?,
        condition.render(&mut params)
    );
    Ok(Statement {
        kind: StatementKind::Delete,
        sql,
        params,
    })
}

/// Runs an insert/update/delete and returns affected rows.
pub fn execute(conn: &Connection, statement: &Statement) -> DbResult<u64> {
    let started_at = Instant::now();
    let result = conn
        .prepare_cached(&statement.sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(statement.params.iter())));
    match result {
        Ok(rows) => {
            let rows = rows as u64;
            trace_sql(&statement.sql, Some(rows), started_at.elapsed(), None);
            Ok(rows)
        }
        Err(err) => {
            trace_sql(&statement.sql, None, started_at.elapsed(), Some(&err));
            Err(err.into())
        }
    }
}

/// Runs a select and decodes every row.
pub fn query_entities<T: Entity>(conn: &Connection, statement: &Statement) -> DbResult<Vec<T>> {
    let started_at = Instant::now();
    let result = fetch_entities::<T>(conn, statement);
    match &result {
        Ok(entities) => trace_sql(
            &statement.sql,
            Some(entities.len() as u64),
            started_at.elapsed(),
            None,
        ),
        Err(err) => trace_sql(&statement.sql, None, started_at.elapsed(), Some(err)),
    }
    result.map_err(Into::into)
}

/// Runs a `COUNT(*)` statement.
pub fn query_count(conn: &Connection, statement: &Statement) -> DbResult<u64> {
    let started_at = Instant::now();
    let result = conn.prepare_cached(&statement.sql).and_then(|mut stmt| {
        stmt.query_row(params_from_iter(statement.params.iter()), |row| {
            row.get::<_, i64>(0)
        })
    });
    match result {
        Ok(total) => {
            let total = u64::try_from(total).unwrap_or(0);
            trace_sql(&statement.sql, Some(total), started_at.elapsed(), None);
            Ok(total)
        }
        Err(err) => {
            trace_sql(&statement.sql, None, started_at.elapsed(), Some(&err));
            Err(err.into())
        }
    }
}

fn fetch_entities<T: Entity>(
    conn: &Connection,
    statement: &Statement,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(&statement.sql)?;
    let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(T::from_row(row)?);
    }
    Ok(entities)
}

fn quote_table(table: &str) -> Result<String, ValidationError> {
    validate_column(table)?;
    Ok(quote_ident(table))
}

fn quoted_list(columns: &[&str]) -> Result<String, ValidationError> {
    let mut quoted = Vec::with_capacity(columns.len());
    for column in columns {
        validate_column(column)?;
        quoted.push(quote_ident(column));
    }
    Ok(quoted.join(", "))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
