use crate::query::Window;
use crate::validation::ValidationError;

/// One-based page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: i64,
    pub size: i64,
}

impl PageRequest {
    pub fn new(number: i64, size: i64) -> Self {
        Self { number, size }
    }

    /// Rejects non-positive coordinates and offsets that overflow.
    pub fn window(&self) -> Result<Window, ValidationError> {
        let invalid = || ValidationError::InvalidPage {
            number: self.number,
            size: self.size,
        };
        if self.number <= 0 || self.size <= 0 {
            return Err(invalid());
        }
        let offset = (self.number - 1).checked_mul(self.size).ok_or_else(invalid)?;
        Ok(Window {
            limit: self.size,
            offset,
        })
    }
}

/// Rows of one page plus the total matching rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub total: u64,
    pub number: i64,
    pub size: i64,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub(crate) fn empty(request: PageRequest) -> Self {
        Self {
            total: 0,
            number: request.number,
            size: request.size,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
