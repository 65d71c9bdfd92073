mod common;

use common::{seed_teachers, setup_conn, Teacher};
use log::{LevelFilter, Log, Metadata, Record};
use rusqlite::types::Value;
use std::cell::RefCell;
use std::sync::Once;
use txmapper_core::db::open_db_in_memory;
use txmapper_core::{ColumnMap, Mapper, MapperError, PageRequest, ReadOptions, ValidationError};

thread_local! {
    static EXECUTED_SQL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Collects `sql_exec` lines emitted on the current test thread.
struct SqlCapture;

impl Log for SqlCapture {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let line = record.args().to_string();
        if line.contains("event=sql_exec") {
            EXECUTED_SQL.with(|lines| lines.borrow_mut().push(line));
        }
    }

    fn flush(&self) {}
}

static SQL_CAPTURE: SqlCapture = SqlCapture;
static INSTALL_CAPTURE: Once = Once::new();

fn start_sql_capture() {
    INSTALL_CAPTURE.call_once(|| {
        log::set_logger(&SQL_CAPTURE).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    EXECUTED_SQL.with(|lines| lines.borrow_mut().clear());
}

fn executed_sql() -> Vec<String> {
    EXECUTED_SQL.with(|lines| lines.borrow().clone())
}

#[test]
fn pages_are_one_based_and_carry_the_total() {
    let conn = setup_conn();
    seed_teachers(&conn, &["a", "b", "c", "d", "e"]);
    let mapper = Mapper::<Teacher>::with_connection(&conn);

    let page = mapper
        .select_page_by_where("1 = 1", vec![], PageRequest::new(3, 2), &ReadOptions::ordered("name"))
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.number, 3);
    assert_eq!(page.size, 2);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].name, "e");

    let page = mapper
        .select_page_by_condition(
            &Teacher::default(),
            PageRequest::new(1, 2),
            &ReadOptions::ordered("name desc"),
        )
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(
        page.rows
            .iter()
            .map(|teacher| teacher.name.as_str())
            .collect::<Vec<_>>(),
        vec!["e", "d"]
    );
}

#[test]
fn page_past_the_end_is_empty_but_keeps_total() {
    let conn = setup_conn();
    seed_teachers(&conn, &["a", "b"]);
    let mapper = Mapper::<Teacher>::with_connection(&conn);

    let page = mapper
        .select_page_by_map(&ColumnMap::new(), PageRequest::new(4, 10), &ReadOptions::default())
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.is_empty());
}

#[test]
fn zero_count_skips_the_page_query() {
    let conn = setup_conn();
    seed_teachers(&conn, &["a"]);
    let mapper = Mapper::<Teacher>::with_connection(&conn);

    start_sql_capture();
    let page = mapper
        .select_page_by_where(
            "name = ?",
            vec![Value::Text("nobody".to_string())],
            PageRequest::new(1, 10),
            &ReadOptions::default(),
        )
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.rows.is_empty());
    let executed = executed_sql();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].contains("SELECT COUNT(*)"));

    start_sql_capture();
    let page = mapper
        .select_page_by_where("1 = 1", vec![], PageRequest::new(1, 10), &ReadOptions::default())
        .unwrap();
    assert_eq!(page.total, 1);
    let executed = executed_sql();
    assert_eq!(executed.len(), 2);
    assert!(executed[1].contains("LIMIT ? OFFSET ?"));
}

#[test]
fn invalid_page_fails_before_any_query() {
    // No schema: any issued statement would fail with a driver error.
    let conn = open_db_in_memory().unwrap();
    let mapper = Mapper::<Teacher>::with_connection(&conn);
    start_sql_capture();

    for (number, size) in [(0, 10), (1, 0), (-2, -2)] {
        let err = mapper
            .select_page_by_where("1 = 1", vec![], PageRequest::new(number, size), &ReadOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            MapperError::Validation(ValidationError::InvalidPage { .. })
        ));
    }
    assert!(executed_sql().is_empty());
}
