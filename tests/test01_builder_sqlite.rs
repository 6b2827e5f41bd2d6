#![cfg(feature = "sqlite")]

use chrono::NaiveDateTime;
use simple_db::prelude::*;
use tempfile::TempDir;

#[derive(Debug, Default, Clone, PartialEq)]
struct Article {
    id: i64,
    created_date: Option<NaiveDateTime>,
    modified_date: Option<NaiveDateTime>,
    title: String,
    body: String,
    is_blind: bool,
}

impl_from_row!(Article {
    id,
    created_date => "createdDate",
    modified_date => "modifiedDate",
    title,
    body,
    is_blind => "isBlind",
});

fn article_db() -> Result<(TempDir, SimpleDb), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = SimpleDb::sqlite(dir.path().to_string_lossy(), "articles.db");
    db.run_batch(
        "CREATE TABLE article (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            createdDate DATETIME NOT NULL,
            modifiedDate DATETIME NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            isBlind BOOLEAN NOT NULL DEFAULT 0
        );",
    )?;
    for n in 1..=6 {
        db.sql()?
            .append(
                "INSERT INTO article (createdDate, modifiedDate, title, body, isBlind)",
                params![],
            )
            .append(
                "VALUES (datetime('now'), datetime('now'), ?, ?, ?)",
                params![format!("title {n}"), format!("body {n}"), n > 3],
            )
            .insert()?;
    }
    db.close()?;
    Ok((dir, db))
}

#[test]
fn insert_returns_generated_id_and_row_maps_back() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, db) = article_db()?;

    let id = db
        .sql()?
        .append(
            "INSERT INTO article (createdDate, modifiedDate, title, body, isBlind)",
            params![],
        )
        .append(
            "VALUES (datetime('now'), datetime('now'), ?, ?, ?)",
            params!["a", "b", false],
        )
        .insert()?;
    assert_eq!(id, 7);

    let article = db
        .sql()?
        .append("SELECT * FROM article WHERE id = ?", params![id])
        .select_row_as::<Article>()?
        .expect("inserted row");
    assert_eq!(article.id, id);
    assert_eq!(article.title, "a");
    assert_eq!(article.body, "b");
    assert!(!article.is_blind);
    assert!(article.created_date.is_some());
    db.close()?;
    Ok(())
}

#[test]
fn append_in_expands_membership_lists() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, db) = article_db()?;

    let mut sql = db.sql()?;
    sql.append("SELECT id FROM article", params![])
        .append_in("WHERE id IN (?)", [1, 2, 3])
        .append("ORDER BY id DESC", params![]);
    assert_eq!(
        sql.sql_text(),
        "SELECT id FROM article WHERE id IN (?,?,?) ORDER BY id DESC"
    );
    assert_eq!(sql.params(), params![1, 2, 3].as_slice());
    assert_eq!(sql.select_longs()?, vec![Some(3), Some(2), Some(1)]);

    let titles: Vec<String> = db
        .sql()?
        .append("SELECT title FROM article WHERE isBlind = ?", params![false])
        .append_in("AND id IN (?)", [2, 5, 3])
        .append("ORDER BY id", params![])
        .select_rows()?
        .into_iter()
        .map(|row| row.get("title").and_then(RowValues::to_text).unwrap_or_default())
        .collect();
    assert_eq!(titles, ["title 2", "title 3"]);
    db.close()?;
    Ok(())
}

#[test]
fn select_rows_keeps_column_order_and_types() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, db) = article_db()?;

    let rows = db
        .sql()?
        .append("SELECT id, title, isBlind, createdDate FROM article", params![])
        .append("WHERE id BETWEEN ? AND ?", params![3, 4])
        .select_rows()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].columns(), ["id", "title", "isBlind", "createdDate"]);
    assert_eq!(rows[0].get("isBlind"), Some(&RowValues::Bool(false)));
    assert_eq!(rows[1].get("isBlind"), Some(&RowValues::Bool(true)));
    assert!(matches!(
        rows[0].get("createdDate"),
        Some(RowValues::Timestamp(_))
    ));

    let articles = db
        .sql()?
        .append("SELECT * FROM article ORDER BY id", params![])
        .select_rows_as::<Article>()?;
    assert_eq!(articles.len(), 6);
    assert_eq!(articles.iter().filter(|a| a.is_blind).count(), 3);
    db.close()?;
    Ok(())
}

#[test]
fn scalar_accessors() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, db) = article_db()?;

    assert_eq!(
        db.sql()?.append("SELECT COUNT(*) FROM article", params![]).select_long()?,
        Some(6)
    );
    assert_eq!(
        db.sql()?
            .append("SELECT title FROM article WHERE id = ?", params![1])
            .select_string()?
            .as_deref(),
        Some("title 1")
    );
    assert_eq!(
        db.sql()?
            .append("SELECT isBlind FROM article WHERE id = ?", params![6])
            .select_boolean()?,
        Some(true)
    );
    assert_eq!(
        db.sql()?.append("SELECT 1 = 0", params![]).select_boolean()?,
        Some(false)
    );
    assert!(
        db.sql()?
            .append("SELECT createdDate FROM article WHERE id = ?", params![1])
            .select_datetime()?
            .is_some()
    );
    assert_eq!(
        db.sql()?
            .append("SELECT title FROM article WHERE id = ?", params![100])
            .select_row()?
            .map(|row| row.len()),
        None
    );
    assert_eq!(
        db.sql()?
            .append("SELECT NULL", params![])
            .select_long()?,
        None
    );
    db.close()?;
    Ok(())
}

#[test]
fn update_and_delete_report_affected_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, db) = article_db()?;

    let changed = db
        .sql()?
        .append("UPDATE article", params![])
        .append("SET title = ?", params!["new title"])
        .append("WHERE id IN (?, ?)", params![1, 2])
        .update()?;
    assert_eq!(changed, 2);

    let removed = db
        .sql()?
        .append("DELETE FROM article WHERE isBlind = ?", params![true])
        .delete()?;
    assert_eq!(removed, 3);

    assert_eq!(db.run("DELETE FROM article WHERE id = ?", &params![100])?, 0);
    assert!(!db.has_connection());
    Ok(())
}

#[test]
fn insert_without_a_new_rowid_returns_zero() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, db) = article_db()?;
    db.run("CREATE TABLE tag (name TEXT PRIMARY KEY) WITHOUT ROWID", &[])?;

    let mut sql = db.sql()?;
    let id = sql
        .append(
            "INSERT INTO article (createdDate, modifiedDate, title, body) VALUES (datetime('now'), datetime('now'), ?, ?)",
            params!["seventh", "body"],
        )
        .insert()?;
    assert_eq!(id, 7);

    let tag = sql
        .append("INSERT INTO tag (name) VALUES (?)", params!["rust"])
        .insert()?;
    assert_eq!(tag, 0);

    let touched = sql
        .append("UPDATE article SET title = ? WHERE id = ?", params!["renamed", 1])
        .insert()?;
    assert_eq!(touched, 0);

    let returned = sql
        .append(
            "INSERT INTO article (createdDate, modifiedDate, title, body) VALUES (datetime('now'), datetime('now'), ?, ?) RETURNING id",
            params!["eighth", "body"],
        )
        .insert()?;
    assert_eq!(returned, 8);
    db.close()?;
    Ok(())
}
