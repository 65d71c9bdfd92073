use crate::mapper::{Inserted, MapperResult};
use rusqlite::Connection;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
    Custom,
    /// Marks the session non-committable when reached.
    Rollback,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Custom => "custom",
            Self::Rollback => "rollback",
        }
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The step ran no statement whose rows count.
    NotInvoked,
    /// A read; never subject to the zero-rows policy.
    Matched { rows: u64 },
    /// A write.
    Affected {
        rows: u64,
        generated_key: Option<i64>,
    },
}

impl Outcome {
    pub fn affected(rows: u64) -> Self {
        Self::Affected {
            rows,
            generated_key: None,
        }
    }

    pub fn rows(&self) -> Option<u64> {
        match self {
            Self::NotInvoked => None,
            Self::Matched { rows } | Self::Affected { rows, .. } => Some(*rows),
        }
    }

    pub fn generated_key(&self) -> Option<i64> {
        match self {
            Self::Affected { generated_key, .. } => *generated_key,
            Self::NotInvoked | Self::Matched { .. } => None,
        }
    }

    pub fn is_zero_row_write(&self) -> bool {
        matches!(self, Self::Affected { rows: 0, .. })
    }
}

impl From<Inserted> for Outcome {
    fn from(value: Inserted) -> Self {
        Self::Affected {
            rows: value.rows,
            generated_key: value.generated_key,
        }
    }
}

type StepFn<'a> = Box<dyn FnOnce(&Connection) -> MapperResult<Outcome> + 'a>;

pub(crate) enum Step<'a> {
    Run(StepFn<'a>),
    RollbackMarker,
}

/// One unit of work for a session.
pub struct Operation<'a> {
    kind: OperationKind,
    pub(crate) label: String,
    pub(crate) step: Step<'a>,
}

impl<'a> Operation<'a> {
    pub fn new<F>(kind: OperationKind, label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(&Connection) -> MapperResult<Outcome> + 'a,
    {
        Self {
            kind,
            label: label.into(),
            step: Step::Run(Box::new(run)),
        }
    }

    pub(crate) fn rollback_marker() -> Self {
        Self {
            kind: OperationKind::Rollback,
            label: "rollback".to_string(),
            step: Step::RollbackMarker,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Debug for Operation<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Queued, not run yet.
    Pending,
    Executed(Outcome),
    Failed,
    Cancelled,
    /// Never run because the session already stopped being committable.
    Skipped,
}

/// Diagnostic entry kept for every operation handed to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub index: usize,
    pub kind: OperationKind,
    pub label: String,
    pub status: StepStatus,
}

impl StepRecord {
    pub(crate) fn executed_outcome(&self) -> Option<Outcome> {
        match self.status {
            StepStatus::Executed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Slot filled by a read step once it runs.
///
/// In immediate mode the value is available as soon as the call returns; in
/// deferred mode only after `execute`.
pub struct Fetched<T>(Rc<RefCell<Option<T>>>);

impl<T> Fetched<T> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    pub fn is_filled(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Moves the value out; `None` when the step never ran.
    pub fn take(&self) -> Option<T> {
        self.0.borrow_mut().take()
    }

    pub(crate) fn fill(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }
}

impl<T: Clone> Fetched<T> {
    pub fn get(&self) -> Option<T> {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Fetched<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for Fetched<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for Fetched<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Fetched").field(&self.0.borrow()).finish()
    }
}
