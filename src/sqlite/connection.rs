use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::types::Value;

use crate::driver::{ConnectTarget, Driver, DriverConnection};
use crate::error::DriverError;
use crate::results::Row;
use crate::types::{DatabaseType, RowValues};

use super::params::Params;
use super::query::{DeclaredKind, build_rows, decode_value};

const MEMORY: &str = ":memory:";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens `rusqlite` connections.
///
/// `host` names the directory and `db_name` the file inside it. Either one
/// being `:memory:` opens a private in-memory database, which disappears when
/// its context closes. Credentials and the timezone qualifier have no `SQLite`
/// equivalent and are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    /// The file a target resolves to, or `None` for an in-memory database.
    #[must_use]
    pub fn database_path(target: &ConnectTarget) -> Option<PathBuf> {
        if target.host == MEMORY || target.db_name == MEMORY {
            None
        } else {
            Some(Path::new(&target.host).join(&target.db_name))
        }
    }
}

impl Driver for SqliteDriver {
    fn database_type(&self) -> Option<DatabaseType> {
        Some(DatabaseType::Sqlite)
    }

    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn DriverConnection>, DriverError> {
        let conn = match Self::database_path(target) {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(%target, journal_mode = %mode, "opened sqlite connection");
        Ok(Box::new(SqliteConnection { conn }))
    }
}

/// A single `rusqlite` connection driven synchronously.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    fn no_transaction(operation: &str) -> DriverError {
        DriverError::other(format!(
            "{operation} requested while auto-commit is enabled"
        ))
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .field("auto_commit", &self.conn.is_autocommit())
            .finish()
    }
}

impl DriverConnection for SqliteConnection {
    fn is_valid(&self) -> bool {
        // rusqlite handles stay open until dropped.
        true
    }

    fn is_auto_commit(&self) -> bool {
        self.conn.is_autocommit()
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError> {
        match (enabled, self.conn.is_autocommit()) {
            (false, true) => self.conn.execute_batch("BEGIN")?,
            (true, false) => self.conn.execute_batch("COMMIT")?,
            _ => {}
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if self.conn.is_autocommit() {
            return Err(Self::no_transaction("commit"));
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        if self.conn.is_autocommit() {
            return Err(Self::no_transaction("rollback"));
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, DriverError> {
        let converted = Params::convert(params);
        let mut stmt = self.conn.prepare(sql)?;
        Ok(stmt.execute(converted.as_bindable())?)
    }

    fn execute_returning_key(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<i64>, DriverError> {
        let converted = Params::convert(params);
        let before = self.conn.last_insert_rowid();
        let mut stmt = self.conn.prepare(sql)?;

        // `INSERT ... RETURNING`: the key is the first column of the first row.
        if stmt.column_count() > 0 {
            let mut rows = stmt.query(converted.as_bindable())?;
            let key = match rows.next()? {
                Some(row) => decode_value(row.get::<_, Value>(0)?, DeclaredKind::Other).to_i64()?,
                None => None,
            };
            while rows.next()?.is_some() {}
            return Ok(key);
        }

        let changed = stmt.execute(converted.as_bindable())?;
        drop(stmt);
        // last_insert_rowid is per connection and survives statements that
        // insert nothing into a rowid table.
        let after = self.conn.last_insert_rowid();
        Ok((changed > 0 && after != before).then_some(after))
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Vec<Row>, DriverError> {
        let converted = Params::convert(params);
        let mut stmt = self.conn.prepare(sql)?;
        build_rows(&mut stmt, &converted)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DriverError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.close().map_err(|(_, err)| DriverError::Sqlite(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_target() -> ConnectTarget {
        ConnectTarget {
            host: MEMORY.into(),
            db_name: "unused".into(),
            user: String::new(),
            password: String::new(),
            timezone: "Asia/Seoul".into(),
        }
    }

    #[test]
    fn resolves_paths_under_host_directory() {
        let mut target = memory_target();
        assert_eq!(SqliteDriver::database_path(&target), None);
        target.host = "/var/data".into();
        target.db_name = "app.db".into();
        assert_eq!(
            SqliteDriver::database_path(&target),
            Some(PathBuf::from("/var/data/app.db"))
        );
    }

    #[test]
    fn auto_commit_toggles_a_transaction() -> Result<(), DriverError> {
        let mut conn = SqliteDriver.connect(&memory_target())?;
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")?;
        assert!(conn.is_auto_commit());
        assert!(conn.commit().is_err());

        conn.set_auto_commit(false)?;
        assert!(!conn.is_auto_commit());
        let key = conn.execute_returning_key("INSERT INTO t (v) VALUES (?)", &[RowValues::from("x")])?;
        assert_eq!(key, Some(1));
        conn.rollback()?;
        assert!(conn.is_auto_commit());

        let rows = conn.query("SELECT COUNT(*) AS n FROM t", &[])?;
        assert_eq!(rows[0].get("n"), Some(&RowValues::Int(0)));
        conn.close()
    }

    #[test]
    fn no_rows_changed_means_no_key() -> Result<(), DriverError> {
        let mut conn = SqliteDriver.connect(&memory_target())?;
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")?;
        let key = conn.execute_returning_key("UPDATE t SET v = 'y' WHERE id = 99", &[])?;
        assert_eq!(key, None);
        Ok(())
    }

    #[test]
    fn earlier_rowid_is_not_reported_as_a_new_key() -> Result<(), DriverError> {
        let mut conn = SqliteDriver.connect(&memory_target())?;
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);
             CREATE TABLE tags (name TEXT PRIMARY KEY) WITHOUT ROWID;",
        )?;
        assert_eq!(
            conn.execute_returning_key("INSERT INTO t (v) VALUES (?)", &[RowValues::from("x")])?,
            Some(1)
        );
        assert_eq!(
            conn.execute_returning_key("INSERT INTO tags (name) VALUES (?)", &[RowValues::from("red")])?,
            None
        );
        assert_eq!(
            conn.execute_returning_key("UPDATE t SET v = 'y' WHERE id = 1", &[])?,
            None
        );
        conn.close()
    }

    #[test]
    fn returning_clause_supplies_the_key() -> Result<(), DriverError> {
        let mut conn = SqliteDriver.connect(&memory_target())?;
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")?;
        let key = conn.execute_returning_key(
            "INSERT INTO t (v) VALUES (?), (?) RETURNING id",
            &[RowValues::from("a"), RowValues::from("b")],
        )?;
        assert_eq!(key, Some(1));
        let rows = conn.query("SELECT COUNT(*) AS n FROM t", &[])?;
        assert_eq!(rows[0].get("n"), Some(&RowValues::Int(2)));
        conn.close()
    }
}
