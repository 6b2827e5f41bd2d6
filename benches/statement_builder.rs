//! Criterion measurements for statement assembly and single-row lookups
//! through the builder against an in-memory `SQLite` database.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use simple_db::prelude::*;
use simple_db::translation::{PlaceholderStyle, expand_in_list, translate_placeholders};

fn lookup_row_count() -> i64 {
    std::env::var("BENCH_ROWS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(1_000)
}

// The in-memory database lives as long as this thread's context stays open.
fn seeded_db(rows: i64) -> Result<SimpleDb, SimpleDbError> {
    let db = SimpleDb::sqlite(":memory:", "bench");
    db.sql()?
        .append(
            "CREATE TABLE article (id INTEGER PRIMARY KEY, title TEXT NOT NULL, isBlind BOOLEAN NOT NULL)",
            params![],
        )
        .update()?;
    for n in 0..rows {
        db.sql()?
            .append(
                "INSERT INTO article (title, isBlind) VALUES (?, ?)",
                params![format!("title {n}"), n % 2 == 0],
            )
            .insert()?;
    }
    Ok(db)
}

fn bench_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("placeholders");
    for count in [1_usize, 16, 256] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("expand_in_list", count), &count, |b, &n| {
            b.iter(|| expand_in_list(black_box("AND id IN (?)"), n));
        });
        let sql = expand_in_list("SELECT * FROM t WHERE id IN (?)", count).unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("translate_numbered", count), &sql, |b, sql| {
            b.iter(|| translate_placeholders(black_box(sql), PlaceholderStyle::Numbered));
        });
    }
    group.finish();
}

fn bench_lookups(c: &mut Criterion) {
    let rows = lookup_row_count();
    let db = match seeded_db(rows) {
        Ok(db) => db,
        Err(err) => panic!("failed to seed benchmark database: {err}"),
    };

    let mut group = c.benchmark_group("sqlite_lookup");
    group.bench_function("select_row", |b| {
        let mut id = 0;
        b.iter(|| {
            id = id % rows + 1;
            db.sql()
                .and_then(|mut sql| {
                    sql.append("SELECT id, title, isBlind FROM article WHERE id = ?", params![id])
                        .select_row()
                })
                .map(black_box)
        });
    });
    group.bench_function("select_longs_in_list", |b| {
        b.iter(|| {
            db.sql()
                .and_then(|mut sql| {
                    sql.append("SELECT id FROM article", params![])
                        .append_in("WHERE id IN (?)", [1_i64, 5, 9, 13, 17])
                        .select_longs()
                })
                .map(black_box)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_placeholders, bench_lookups);
criterion_main!(benches);
