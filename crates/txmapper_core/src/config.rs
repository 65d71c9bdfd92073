//! Backend connection configuration.
//!
//! # Responsibility
//! - Describe how one backend connection is opened and bootstrapped.
//! - Provide serde-friendly defaults so configs can be loaded from files.
//!
//! # Invariants
//! - `backend` names are trimmed, non-empty identifiers.
//! - Defaults match an in-memory database with foreign keys enabled.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKEND: &str = "default";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where a backend's SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum DbLocation {
    #[default]
    Memory,
    File(PathBuf),
}

/// Connection settings for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Routing name; entities select it through `Entity::backend()`.
    pub backend: String,
    pub location: DbLocation,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    /// SQL batch executed once right after the connection is opened.
    pub init_sql: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            location: DbLocation::Memory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            init_sql: None,
        }
    }
}

impl DbConfig {
    pub fn in_memory(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    pub fn file(backend: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            location: DbLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Checks the config before any connection is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let backend = self.backend.trim();
        if backend.is_empty() {
            return Err(ConfigError::EmptyBackend);
        }
        if let DbLocation::File(path) = &self.location {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyPath(backend.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyBackend,
    EmptyPath(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBackend => write!(f, "backend name cannot be empty"),
            Self::EmptyPath(backend) => {
                write!(f, "file location for backend `{backend}` has an empty path")
            }
        }
    }
}

impl Error for ConfigError {}
