//! The database driver collaborator.
//!
//! A [`Driver`] opens [`DriverConnection`]s for a [`ConnectTarget`]. The
//! connection manager only talks to these traits, so any backend that accepts
//! `?`-positional SQL can be plugged in with [`crate::SimpleDb::with_driver`].

use std::fmt;

use crate::error::DriverError;
use crate::results::Row;
use crate::types::{DatabaseType, RowValues};

/// Everything a driver needs to open one connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub db_name: String,
    pub user: String,
    pub password: String,
    /// Session timezone qualifier appended to every connection target.
    pub timezone: String,
}

impl ConnectTarget {
    /// Split `host[:port]`.
    #[must_use]
    pub fn host_and_port(&self) -> (&str, Option<u16>) {
        match self.host.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (self.host.as_str(), None),
            },
            None => (self.host.as_str(), None),
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}?timezone={} (user {})",
            self.host, self.db_name, self.timezone, self.user
        )
    }
}

// Hand-written so the password never lands in logs.
impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// Opens connections. Shared by every thread using one manager.
pub trait Driver: Send + Sync + fmt::Debug {
    fn database_type(&self) -> Option<DatabaseType> {
        None
    }

    /// Open a new connection in auto-commit mode.
    ///
    /// # Errors
    /// Returns the backend failure when the connection cannot be established.
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// One live connection, owned by exactly one execution context.
///
/// SQL arrives with `?` positional placeholders and parameters aligned 1:1.
pub trait DriverConnection {
    /// `false` once the underlying handle is unusable and must be replaced.
    fn is_valid(&self) -> bool;

    fn is_auto_commit(&self) -> bool;

    /// Toggle auto-commit. Turning it off opens a transaction.
    ///
    /// # Errors
    /// Returns the backend failure when the mode cannot be changed.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// # Errors
    /// Fails when no transaction is open or the backend rejects the commit.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Fails when no transaction is open or the backend rejects the rollback.
    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Execute a statement and report the affected-row count.
    ///
    /// # Errors
    /// Returns prepare, bind, or execution failures.
    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, DriverError>;

    /// Execute a statement and report the first generated key, if any.
    ///
    /// # Errors
    /// Returns prepare, bind, or execution failures.
    fn execute_returning_key(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<i64>, DriverError>;

    /// Run a query and decode every row.
    ///
    /// # Errors
    /// Returns prepare, bind, execution, or decode failures.
    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Vec<Row>, DriverError>;

    /// Run a parameterless multi-statement script.
    ///
    /// # Errors
    /// Returns the first failing statement's error.
    fn execute_batch(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Release the handle.
    ///
    /// # Errors
    /// Returns the backend failure if the handle did not close cleanly.
    fn close(self: Box<Self>) -> Result<(), DriverError>;
}
