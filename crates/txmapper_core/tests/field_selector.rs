mod common;

use common::{setup_conn, Student, Teacher};
use txmapper_core::{non_default_columns, FieldSelector, Mapper, ReadOptions, Timestamp};

#[test]
fn explicit_zero_in_option_is_written_and_none_is_not() {
    let conn = setup_conn();
    let mapper = Mapper::<Student>::with_connection(&conn);

    let mut graded = Student {
        score: Some(0),
        ..Student::new("zero", 1)
    };
    let mut ungraded = Student::new("unset", 1);
    assert_eq!(non_default_columns(&graded), vec!["name", "teacher_id", "score"]);
    assert_eq!(non_default_columns(&ungraded), vec!["name", "teacher_id"]);

    mapper.insert_without_zero_field(&mut graded, &[]).unwrap();
    mapper.insert_without_zero_field(&mut ungraded, &[]).unwrap();

    let by_score = mapper
        .select_by_condition(
            &Student {
                score: Some(0),
                ..Student::default()
            },
            &ReadOptions::default(),
        )
        .unwrap();
    assert_eq!(by_score.len(), 1);
    assert_eq!(by_score[0].name, "zero");

    let reloaded = mapper
        .select_by_id(&ungraded.id, &ReadOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.score, None);
}

#[test]
fn omitted_zero_fields_take_column_defaults() {
    let conn = setup_conn();
    let mapper = Mapper::<Teacher>::with_connection(&conn);

    let mut defaulted = Teacher::named("defaulted");
    let mut forced = Teacher::named("forced");
    mapper.insert_without_zero_field(&mut defaulted, &[]).unwrap();
    mapper
        .insert_without_zero_field(&mut forced, &["age"])
        .unwrap();

    let ages: Vec<i64> = [defaulted.id, forced.id]
        .iter()
        .map(|id| {
            mapper
                .select_by_id(id, &ReadOptions::default())
                .unwrap()
                .unwrap()
                .age
        })
        .collect();
    assert_eq!(ages, vec![30, 0]);
}

#[test]
fn selection_is_pure_and_repeatable() {
    let teacher = Teacher {
        id: 3,
        age: 41,
        nickname: Some(String::new()),
        ..Teacher::default()
    };
    let selector = FieldSelector::new().always_include(&["sex", "age"]).exclude(&["id"]);

    let first = selector.select(&teacher).unwrap();
    assert_eq!(first, vec!["age", "nickname", "sex"]);
    assert_eq!(selector.select(&teacher).unwrap(), first);
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Lesson {
    id: i64,
    title: String,
    starts_at: Timestamp,
}

txmapper_core::impl_entity!(Lesson {
    table: "lesson",
    key: id,
    fields: [id, title, starts_at],
});

#[test]
fn zero_time_is_omitted_and_stored_as_null() {
    let conn = setup_conn();
    conn.execute_batch(
        "CREATE TABLE lesson (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL, starts_at INTEGER);",
    )
    .unwrap();
    let mapper = Mapper::<Lesson>::with_connection(&conn);

    let mut unscheduled = Lesson {
        title: "intro".to_string(),
        ..Lesson::default()
    };
    let mut scheduled = Lesson {
        title: "joins".to_string(),
        starts_at: Timestamp::from_millis(1_700_000_000_000),
        ..Lesson::default()
    };
    assert_eq!(non_default_columns(&unscheduled), vec!["title"]);
    assert_eq!(non_default_columns(&scheduled), vec!["title", "starts_at"]);

    mapper.insert(&mut unscheduled, &[]).unwrap();
    mapper.insert_without_zero_field(&mut scheduled, &[]).unwrap();

    let nulls: i64 = conn
        .query_row("SELECT COUNT(*) FROM lesson WHERE starts_at IS NULL;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(nulls, 1);

    let by_time = mapper
        .select_by_condition(
            &Lesson {
                starts_at: scheduled.starts_at,
                ..Lesson::default()
            },
            &ReadOptions::default(),
        )
        .unwrap();
    assert_eq!(by_time, vec![scheduled.clone()]);

    let reloaded = mapper
        .select_by_id(&unscheduled.id, &ReadOptions::default())
        .unwrap()
        .unwrap();
    assert!(reloaded.starts_at.is_zero());
}
