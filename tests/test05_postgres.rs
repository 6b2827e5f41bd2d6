//! Runs against a live server only when `SIMPLE_DB_PG_HOST` is set.
//! `SIMPLE_DB_PG_USER`, `SIMPLE_DB_PG_PASSWORD` and `SIMPLE_DB_PG_NAME`
//! default to `postgres`, empty and `postgres`.

#![cfg(feature = "postgres")]

use std::env;

use chrono::NaiveDateTime;
use simple_db::prelude::*;

#[derive(Debug, Default)]
struct Article {
    id: i64,
    created_date: Option<NaiveDateTime>,
    title: String,
    body: String,
    is_blind: bool,
}

impl_from_row!(Article {
    id,
    created_date => "createdDate",
    title,
    body,
    is_blind => "isBlind",
});

fn live_db(table: &str) -> Option<Result<SimpleDb, SimpleDbError>> {
    let host = env::var("SIMPLE_DB_PG_HOST").ok()?;
    let db = SimpleDb::postgres(
        host,
        env::var("SIMPLE_DB_PG_USER").unwrap_or_else(|_| "postgres".into()),
        env::var("SIMPLE_DB_PG_PASSWORD").unwrap_or_default(),
        env::var("SIMPLE_DB_PG_NAME").unwrap_or_else(|_| "postgres".into()),
    );
    let setup = db.run_batch(&format!(
        r#"DROP TABLE IF EXISTS {table};
           CREATE TABLE {table} (
               id BIGSERIAL PRIMARY KEY,
               "createdDate" TIMESTAMP NOT NULL DEFAULT now(),
               title TEXT NOT NULL,
               body TEXT NOT NULL,
               "isBlind" BOOLEAN NOT NULL DEFAULT false
           );"#
    ));
    Some(setup.map(|()| db))
}

#[test]
fn insert_select_and_map_round_trip() -> Result<(), SimpleDbError> {
    let Some(db) = live_db("simple_db_article_map") else {
        return Ok(());
    };
    let db = db?;

    let id = db
        .sql()?
        .append("INSERT INTO simple_db_article_map (title, body, \"isBlind\")", params![])
        .append("VALUES (?, ?, ?) RETURNING id", params!["a", "b", false])
        .insert()?;
    assert!(id > 0);

    let article = db
        .sql()?
        .append("SELECT * FROM simple_db_article_map WHERE id = ?", params![id])
        .select_row_as::<Article>()?
        .expect("inserted row");
    assert_eq!(article.id, id);
    assert_eq!(article.title, "a");
    assert_eq!(article.body, "b");
    assert!(!article.is_blind);
    assert!(article.created_date.is_some());

    let ids = db
        .sql()?
        .append("SELECT id FROM simple_db_article_map", params![])
        .append_in("WHERE id IN (?)", [id, id + 1000])
        .select_longs()?;
    assert_eq!(ids, vec![Some(id)]);
    db.close()?;
    Ok(())
}

#[test]
fn rollback_discards_inserted_row() -> Result<(), SimpleDbError> {
    let Some(db) = live_db("simple_db_article_tx") else {
        return Ok(());
    };
    let db = db?;

    db.sql()?;
    db.begin_transaction()?;
    db.sql()?
        .append("INSERT INTO simple_db_article_tx (title, body) VALUES (?, ?)", params!["t", "b"])
        .update()?;
    let failed = db
        .sql()?
        .append("UPDATE simple_db_article_tx SET title = ?", params![None::<String>])
        .update();
    assert!(matches!(failed, Err(SimpleDbError::ExecutionError { .. })));
    db.rollback()?;
    assert!(!db.has_connection());

    let count = db
        .sql()?
        .append("SELECT COUNT(*) FROM simple_db_article_tx", params![])
        .select_long()?;
    assert_eq!(count, Some(0));
    db.close()?;
    Ok(())
}
