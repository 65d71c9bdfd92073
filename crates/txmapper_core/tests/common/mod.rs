#![allow(dead_code)]

use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;
use txmapper_core::db::{open_db_in_memory, DbError, DbResult, SqliteTx, TxHandle};
use txmapper_core::{ConnectionProvider, DbConfig, Session, TransactionConfig};

pub const SCHEMA: &str = "
CREATE TABLE demo_teacher (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    sex INTEGER NOT NULL DEFAULT 0,
    age INTEGER NOT NULL DEFAULT 30,
    nickname TEXT
);
CREATE TABLE demo_student (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    teacher_id INTEGER NOT NULL DEFAULT 0,
    score INTEGER
);
";

pub const AUDIT_SCHEMA: &str = "
CREATE TABLE audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message TEXT NOT NULL
);
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub sex: u8,
    pub age: i64,
    pub nickname: Option<String>,
}

txmapper_core::impl_entity!(Teacher {
    table: "demo_teacher",
    key: id,
    fields: [id, name, sex, age, nickname],
});

impl Teacher {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub teacher_id: i64,
    pub score: Option<i64>,
}

txmapper_core::impl_entity!(Student {
    table: "demo_student",
    key: id,
    fields: [id, name, teacher_id, score],
});

impl Student {
    pub fn new(name: &str, teacher_id: i64) -> Self {
        Self {
            name: name.to_string(),
            teacher_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    pub id: i64,
    pub message: String,
}

txmapper_core::impl_entity!(AuditLog {
    table: "audit_log",
    key: id,
    backend: "audit",
    fields: [id, message],
});

pub fn setup_conn() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
}

pub fn setup_provider() -> ConnectionProvider {
    ConnectionProvider::from_configs(&[DbConfig::in_memory("main").with_init_sql(SCHEMA)]).unwrap()
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn seed_teachers(conn: &Connection, names: &[&str]) {
    for name in names {
        conn.execute("INSERT INTO demo_teacher (name) VALUES (?1);", [name])
            .unwrap();
    }
}

/// Commit/rollback calls observed on a handle.
#[derive(Debug, Default)]
pub struct HandleCalls {
    pub commits: Cell<u32>,
    pub rollbacks: Cell<u32>,
}

/// SQLite handle that counts commit/rollback calls, optionally failing
/// commits.
pub struct CountingHandle<'c> {
    inner: SqliteTx<&'c Connection>,
    calls: Rc<HandleCalls>,
    fail_commit: bool,
}

impl<'c> CountingHandle<'c> {
    pub fn begin(conn: &'c Connection) -> (Self, Rc<HandleCalls>) {
        let calls = Rc::new(HandleCalls::default());
        let handle = Self {
            inner: SqliteTx::begin(conn).unwrap(),
            calls: Rc::clone(&calls),
            fail_commit: false,
        };
        (handle, calls)
    }

    pub fn failing_commit(conn: &'c Connection) -> (Self, Rc<HandleCalls>) {
        let (mut handle, calls) = Self::begin(conn);
        handle.fail_commit = true;
        (handle, calls)
    }
}

impl TxHandle for CountingHandle<'_> {
    fn connection(&self) -> &Connection {
        self.inner.connection()
    }

    fn commit(&mut self) -> DbResult<()> {
        self.calls.commits.set(self.calls.commits.get() + 1);
        if self.fail_commit {
            return Err(DbError::Closed);
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.calls.rollbacks.set(self.calls.rollbacks.get() + 1);
        self.inner.rollback()
    }
}

pub fn counting_session<'c>(
    conn: &'c Connection,
    config: TransactionConfig,
) -> (Session<'c, CountingHandle<'c>>, Rc<HandleCalls>) {
    let (handle, calls) = CountingHandle::begin(conn);
    (Session::new(handle, config), calls)
}
