use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Operations are queued and replayed by `execute`.
    Deferred,
    /// Operations run as they are added; only the commit waits for `execute`.
    #[default]
    Immediate,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::Immediate => "immediate",
        }
    }
}

/// Shared cancellation flag observed before every step.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub mode: ExecutionMode,
    /// When false, a write affecting no row rolls the session back.
    pub allow_zero_affected_rows: bool,
    #[serde(skip)]
    pub cancellation: Option<Cancellation>,
}

impl TransactionConfig {
    pub fn deferred() -> Self {
        Self {
            mode: ExecutionMode::Deferred,
            ..Self::default()
        }
    }

    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn allow_zero_affected_rows(mut self, allow: bool) -> Self {
        self.allow_zero_affected_rows = allow;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }
}
