//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise mapper and transaction wiring against an in-memory database.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `txmapper_cli [log_dir]`. Logging is enabled only when a
//! directory is given.

use log::info;
use std::process::ExitCode;
use txmapper_core::{
    default_log_level, init_logging, ConnectionProvider, DbConfig, Mapper, PageRequest,
    ReadOptions, Session, TransactionConfig,
};

const DEMO_SCHEMA: &str = "
CREATE TABLE demo_teacher (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    age INTEGER NOT NULL DEFAULT 0
);
";

#[derive(Debug, Clone, Default)]
struct Teacher {
    id: i64,
    name: String,
    age: i64,
}

txmapper_core::impl_entity!(Teacher {
    table: "demo_teacher",
    key: id,
    fields: [id, name, age],
});

fn main() -> ExitCode {
    if let Some(log_dir) = std::env::args().nth(1) {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("txmapper_core version={}", txmapper_core::core_version());
    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ConnectionProvider::from_configs(&[
        DbConfig::in_memory("main").with_init_sql(DEMO_SCHEMA)
    ])?;

    let mut ada = Teacher {
        name: "ada".to_string(),
        age: 36,
        ..Teacher::default()
    };
    let mut alan = Teacher {
        name: "alan".to_string(),
        age: 41,
        ..Teacher::default()
    };
    {
        let mut session = Session::begin(&provider, None, TransactionConfig::deferred())?;
        session.save(&mut ada);
        session.save(&mut alan);
        let state = session.execute()?;
        println!("deferred state={state:?}");
    }
    info!("event=cli_demo module=cli status=ok step=deferred ada={} alan={}", ada.id, alan.id);

    {
        let mut session = Session::begin(&provider, None, TransactionConfig::immediate())?;
        session.update_by_id(
            Teacher {
                id: ada.id,
                age: 37,
                ..Teacher::default()
            },
            &[],
        );
        session.delete_by_id::<Teacher, _>(-1_i64);
        match session.execute() {
            Ok(state) => println!("immediate state={state:?}"),
            Err(err) => println!("immediate state={:?} error={err}", session.state()),
        }
    }

    let page = Mapper::<Teacher>::new(&provider).select_page_by_where(
        "1 = 1",
        Vec::new(),
        PageRequest::new(1, 10),
        &ReadOptions::ordered("name"),
    )?;
    for teacher in &page.rows {
        println!("teacher id={} name={} age={}", teacher.id, teacher.name, teacher.age);
    }
    println!("total={}", page.total);
    Ok(())
}
