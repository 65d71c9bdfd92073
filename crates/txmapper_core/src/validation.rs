//! Pre-I/O validation of caller input.
//!
//! # Responsibility
//! - Reject bad pagination, empty projections and unfiltered writes.
//! - Validate column identifiers and order-by clauses before they reach SQL.
//! - Reject columns the entity does not declare.
//!
//! # Invariants
//! - Everything reported here is detected before any statement is issued.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static ORDER_TERM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([A-Za-z_][A-Za-z0-9_]*)(\s+(asc|desc))?$").expect("valid order term regex")
});

/// Caller input rejected before any database round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `page_number` or `page_size` is not positive.
    InvalidPage { number: i64, size: i64 },
    /// A write resolved to zero columns.
    EmptyProjection,
    /// An update or delete resolved to no filter predicate.
    MissingCondition,
    /// Update by id on an entity whose primary key is unset.
    MissingPrimaryKey,
    /// Identifier is not a plain column name.
    InvalidColumn(String),
    /// Column is not declared by the entity.
    UnknownColumn(String),
    InvalidOrderBy(String),
    /// Batch write with no entities.
    EmptyBatch,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPage { number, size } => write!(
                f,
                "page number and size must be positive, got number={number} size={size}"
            ),
            Self::EmptyProjection => write!(f, "no column to write"),
            Self::MissingCondition => write!(f, "refusing to write without a filter condition"),
            Self::MissingPrimaryKey => write!(f, "entity primary key is not set"),
            Self::InvalidColumn(name) => write!(f, "invalid column identifier `{name}`"),
            Self::UnknownColumn(name) => write!(f, "column `{name}` is not declared by entity"),
            Self::InvalidOrderBy(clause) => write!(f, "invalid order by clause `{clause}`"),
            Self::EmptyBatch => write!(f, "batch contains no entity"),
        }
    }
}

impl Error for ValidationError {}

/// Checks that `name` is a bare column identifier.
pub fn validate_column(name: &str) -> Result<(), ValidationError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColumn(name.to_string()))
    }
}

/// Resolves `name` to one of the `declared` columns.
pub fn declared_column(
    declared: &[&'static str],
    name: &str,
) -> Result<&'static str, ValidationError> {
    validate_column(name)?;
    declared
        .iter()
        .copied()
        .find(|column| *column == name)
        .ok_or_else(|| ValidationError::UnknownColumn(name.to_string()))
}

/// Parses `"name desc, id"` into quoted SQL, or rejects it.
///
/// Every term must name one of the `declared` columns.
pub fn order_by_sql(clause: &str, declared: &[&'static str]) -> Result<String, ValidationError> {
    let mut terms = Vec::new();
    for raw_term in clause.split(',') {
        let term = raw_term.trim();
        let captures = ORDER_TERM_RE
            .captures(term)
            .ok_or_else(|| ValidationError::InvalidOrderBy(clause.to_string()))?;
        let column = quote_ident(declared_column(declared, &captures[1])?);
        match captures.get(3) {
            Some(direction) => {
                terms.push(format!("{column} {}", direction.as_str().to_ascii_uppercase()))
            }
            None => terms.push(column),
        }
    }
    Ok(terms.join(", "))
}

/// Quotes an already validated identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}
