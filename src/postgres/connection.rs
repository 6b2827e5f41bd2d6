use std::fmt;
use std::future::Future;

use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{Client, NoTls};

use crate::driver::{ConnectTarget, Driver, DriverConnection};
use crate::error::DriverError;
use crate::results::Row;
use crate::translation::{PlaceholderStyle, translate_placeholders};
use crate::types::{DatabaseType, RowValues};

use super::params::as_refs;
use super::query::{build_rows_from_statement, postgres_extract_value};

/// Opens `tokio-postgres` connections behind a blocking façade.
///
/// Each connection owns a current-thread runtime; every call blocks on it, which
/// also drives the background connection task. `host` may carry a `:port`
/// suffix, and the timezone qualifier is sent as the session `TimeZone`.
///
/// Generated keys come from the statement's own result: write
/// `INSERT ... RETURNING id` and `insert()` yields the first column of the
/// first returned row. The same statement text works on the `SQLite` driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl Driver for PostgresDriver {
    fn database_type(&self) -> Option<DatabaseType> {
        Some(DatabaseType::Postgres)
    }

    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn DriverConnection>, DriverError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let (host, port) = target.host_and_port();
        let mut config = tokio_postgres::Config::new();
        config
            .host(host)
            .dbname(&target.db_name)
            .user(&target.user)
            .password(&target.password)
            .options(&format!("-c TimeZone={}", target.timezone));
        if let Some(port) = port {
            config.port(port);
        }

        let (client, connection) = runtime.block_on(config.connect(NoTls))?;
        runtime.spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(error = %err, "postgres connection task ended with error");
            }
        });
        tracing::debug!(%target, "opened postgres connection");

        Ok(Box::new(PostgresConnection {
            client,
            runtime,
            auto_commit: true,
        }))
    }
}

/// A single `tokio-postgres` client driven synchronously.
pub struct PostgresConnection {
    // Dropped before the runtime that drives it.
    client: Client,
    runtime: Runtime,
    auto_commit: bool,
}

impl PostgresConnection {
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn end_transaction(&mut self, verb: &'static str) -> Result<(), DriverError> {
        if self.auto_commit {
            return Err(DriverError::other(format!(
                "{} requested while auto-commit is enabled",
                verb.to_ascii_lowercase()
            )));
        }
        self.block_on(self.client.batch_execute(verb))?;
        self.auto_commit = true;
        Ok(())
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("closed", &self.client.is_closed())
            .field("auto_commit", &self.auto_commit)
            .finish_non_exhaustive()
    }
}

impl DriverConnection for PostgresConnection {
    fn is_valid(&self) -> bool {
        !self.client.is_closed()
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError> {
        match (enabled, self.auto_commit) {
            (false, true) => {
                self.block_on(self.client.batch_execute("BEGIN"))?;
                self.auto_commit = false;
            }
            (true, false) => self.end_transaction("COMMIT")?,
            _ => {}
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.end_transaction("ROLLBACK")
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, DriverError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Numbered);
        let refs = as_refs(params);
        let affected = self.block_on(self.client.execute(sql.as_ref(), &refs))?;
        usize::try_from(affected)
            .map_err(|e| DriverError::other(format!("affected rows conversion error: {e}")))
    }

    fn execute_returning_key(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<i64>, DriverError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Numbered);
        let refs = as_refs(params);
        let rows = self.block_on(self.client.query(sql.as_ref(), &refs))?;
        let Some(row) = rows.first().filter(|row| !row.is_empty()) else {
            return Ok(None);
        };
        let key = postgres_extract_value(row, 0)?.to_i64()?;
        Ok(key)
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Vec<Row>, DriverError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Numbered);
        let refs = as_refs(params);
        let stmt = self.block_on(self.client.prepare(sql.as_ref()))?;
        let rows = self.block_on(self.client.query(&stmt, &refs))?;
        build_rows_from_statement(&stmt, &rows)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DriverError> {
        self.block_on(self.client.batch_execute(sql))?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let PostgresConnection {
            client, runtime, ..
        } = *self;
        drop(client);
        runtime.shutdown_background();
        Ok(())
    }
}
