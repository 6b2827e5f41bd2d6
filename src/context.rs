//! Thread-scoped connection management.
//!
//! Every [`SimpleDb`] owns at most one connection per thread. The binding lives
//! in a thread-local table keyed by manager id, so two threads sharing one
//! manager never see each other's connection or transaction state.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::DbConfig;
use crate::driver::{Driver, DriverConnection};
use crate::error::{DriverError, Result, SimpleDbError};
use crate::query_builder::SqlBuilder;
use crate::types::{DatabaseType, RowValues};

/// A thread's connection slot. Builders hold a clone so they can detect that
/// the context was closed underneath them.
pub(crate) type ConnectionSlot = Rc<RefCell<Option<Box<dyn DriverConnection>>>>;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Ids of managers that have not been dropped yet.
static LIVE_MANAGERS: Mutex<BTreeSet<u64>> = Mutex::new(BTreeSet::new());

fn live_managers() -> std::sync::MutexGuard<'static, BTreeSet<u64>> {
    LIVE_MANAGERS.lock().unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    static CONTEXTS: RefCell<HashMap<u64, ConnectionSlot>> = RefCell::new(HashMap::new());
}

/// Connection manager shared across threads.
///
/// Dropping a manager closes the dropping thread's connection. Connections it
/// left bound on other threads are closed the next time any manager opens a
/// connection on that thread, or when the thread exits.
///
/// ```rust,no_run
/// # #[cfg(feature = "sqlite")] {
/// use simple_db::prelude::*;
///
/// # fn main() -> Result<(), SimpleDbError> {
/// let db = SimpleDb::sqlite("/var/lib/app", "app.db");
/// db.run("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, v TEXT)", &[])?;
///
/// db.sql()?;
/// db.begin_transaction()?;
/// let id = db.sql()?.append("INSERT INTO t (v) VALUES (?)", params!["a"]).insert()?;
/// db.commit()?;
/// # let _ = id;
/// # Ok(())
/// # }
/// # }
/// ```
#[derive(Debug)]
pub struct SimpleDb {
    id: u64,
    config: DbConfig,
    driver: Arc<dyn Driver>,
    dev_mode: AtomicBool,
}

impl SimpleDb {
    /// Manager for `config.backend` using the bundled driver.
    #[must_use]
    pub fn new(config: DbConfig) -> Self {
        let driver: Arc<dyn Driver> = match config.backend {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Arc::new(crate::sqlite::SqliteDriver),
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Arc::new(crate::postgres::PostgresDriver),
        };
        Self::with_driver(config, driver)
    }

    /// Manager backed by a caller-supplied driver.
    #[must_use]
    pub fn with_driver(config: DbConfig, driver: Arc<dyn Driver>) -> Self {
        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        live_managers().insert(id);
        let dev_mode = AtomicBool::new(config.dev_mode);
        tracing::debug!(manager = id, config = ?config, "created connection manager");
        Self {
            id,
            config,
            driver,
            dev_mode,
        }
    }

    /// `SQLite` database file `db_name` inside directory `dir`.
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sqlite(dir: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self::new(DbConfig::new(DatabaseType::Sqlite, dir, "", "", db_name))
    }

    /// `PostgreSQL` database at `host[:port]`.
    #[cfg(feature = "postgres")]
    #[must_use]
    pub fn postgres(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Self::new(DbConfig::new(
            DatabaseType::Postgres,
            host,
            user,
            password,
            db_name,
        ))
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Toggle statement logging for builders created after this call.
    pub fn set_dev_mode(&self, enabled: bool) {
        self.dev_mode.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn dev_mode(&self) -> bool {
        self.dev_mode.load(Ordering::Relaxed)
    }

    /// Whether the calling thread currently holds an open connection.
    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.current_slot()
            .is_some_and(|slot| slot.borrow().is_some())
    }

    /// A fresh statement builder bound to this thread's connection, opening
    /// one if needed.
    ///
    /// # Errors
    /// Returns `ConnectionError` when a new connection cannot be opened.
    pub fn sql(&self) -> Result<SqlBuilder> {
        let slot = self.ensure_connection()?;
        Ok(SqlBuilder::new(slot, self.dev_mode()))
    }

    /// Switch this thread's open connection to manual-commit mode.
    ///
    /// Does not open a connection; acquire one with [`SimpleDb::sql`] first.
    ///
    /// # Errors
    /// Returns `TransactionError` if the thread has no open connection or the
    /// driver refuses the mode change.
    pub fn begin_transaction(&self) -> Result<()> {
        self.with_open_connection("begin", |conn| conn.set_auto_commit(false))?;
        tracing::debug!(manager = self.id, "transaction started");
        Ok(())
    }

    /// Commit the open transaction, then close the context.
    ///
    /// # Errors
    /// `TransactionError` if the commit fails (the context is still closed),
    /// `CloseError` if the commit succeeded but the close did not.
    pub fn commit(&self) -> Result<()> {
        self.finish("commit", |conn| conn.commit())
    }

    /// Roll back the open transaction, then close the context.
    ///
    /// # Errors
    /// Same contract as [`SimpleDb::commit`].
    pub fn rollback(&self) -> Result<()> {
        self.finish("rollback", |conn| conn.rollback())
    }

    /// Release this thread's connection.
    ///
    /// The binding is cleared even when the driver reports a close failure.
    ///
    /// # Errors
    /// `StateError` if the thread has no connection, `CloseError` if the
    /// driver failed to close it.
    pub fn close(&self) -> Result<()> {
        let conn = self.detach().ok_or_else(|| {
            SimpleDbError::StateError("close called without an open connection".into())
        })?;
        tracing::debug!(manager = self.id, "closing connection");
        conn.close().map_err(SimpleDbError::CloseError)
    }

    /// Execute one statement and close the context afterwards.
    ///
    /// # Errors
    /// The statement's error takes precedence; otherwise any close failure.
    pub fn run(&self, sql: &str, params: &[RowValues]) -> Result<usize> {
        let outcome = self.sql().and_then(|mut builder| builder.append(sql, params).update());
        self.close_after("run", outcome)
    }

    /// Execute a parameterless multi-statement script and close the context.
    ///
    /// # Errors
    /// The script's error takes precedence; otherwise any close failure.
    pub fn run_batch(&self, sql: &str) -> Result<()> {
        let outcome = self.ensure_connection().and_then(|slot| {
            if self.dev_mode() {
                tracing::info!(sql = %sql, "SQL batch");
            }
            match slot.borrow_mut().as_deref_mut() {
                Some(conn) => conn
                    .execute_batch(sql)
                    .map_err(|source| SimpleDbError::execution(sql, source)),
                None => Err(SimpleDbError::StateError(
                    "connection closed before batch ran".into(),
                )),
            }
        });
        self.close_after("run_batch", outcome)
    }

    /// Run `work` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The context is closed either way.
    ///
    /// # Errors
    /// Returns the closure's error after rolling back, or the begin/commit
    /// failure.
    pub fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&SimpleDb) -> Result<T>,
    {
        self.ensure_connection()?;
        if let Err(err) = self.begin_transaction() {
            if self.has_connection() {
                if let Err(close_err) = self.close() {
                    tracing::warn!(error = %close_err, "close after failed begin also failed");
                }
            }
            return Err(err);
        }

        match work(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed transaction body also failed");
                }
                Err(err)
            }
        }
    }

    fn current_slot(&self) -> Option<ConnectionSlot> {
        CONTEXTS.with(|contexts| contexts.borrow().get(&self.id).cloned())
    }

    /// Remove this thread's binding and hand back the connection it held.
    fn detach(&self) -> Option<Box<dyn DriverConnection>> {
        let slot = CONTEXTS.with(|contexts| contexts.borrow_mut().remove(&self.id));
        slot.and_then(|slot| slot.take())
    }

    fn ensure_connection(&self) -> Result<ConnectionSlot> {
        if let Some(slot) = self.current_slot() {
            let reusable = slot.borrow().as_ref().is_some_and(|conn| conn.is_valid());
            if reusable {
                return Ok(slot);
            }
            if let Some(stale) = self.detach() {
                tracing::debug!(manager = self.id, "replacing invalid connection");
                if let Err(err) = stale.close() {
                    tracing::warn!(error = %err, "closing invalid connection failed");
                }
            }
        }

        close_orphaned_connections();

        let target = self.config.target();
        let conn = self
            .driver
            .connect(&target)
            .map_err(|source| SimpleDbError::ConnectionError {
                target: target.to_string(),
                source,
            })?;
        tracing::debug!(manager = self.id, %target, "opened connection");

        let slot: ConnectionSlot = Rc::new(RefCell::new(Some(conn)));
        CONTEXTS.with(|contexts| {
            contexts.borrow_mut().insert(self.id, Rc::clone(&slot));
        });
        Ok(slot)
    }

    fn with_open_connection<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn DriverConnection) -> std::result::Result<T, DriverError>,
    ) -> Result<T> {
        let slot = self.current_slot().ok_or_else(|| {
            SimpleDbError::transaction(operation, DriverError::other("no open connection"))
        })?;
        let mut guard = slot.borrow_mut();
        let conn = guard.as_deref_mut().ok_or_else(|| {
            SimpleDbError::transaction(operation, DriverError::other("no open connection"))
        })?;
        f(conn).map_err(|source| SimpleDbError::transaction(operation, source))
    }

    fn finish(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn DriverConnection) -> std::result::Result<(), DriverError>,
    ) -> Result<()> {
        let outcome = self.with_open_connection(operation, f);
        if !self.has_connection() {
            return outcome;
        }
        if outcome.is_ok() {
            tracing::debug!(manager = self.id, operation, "transaction finished");
        }
        self.close_after(operation, outcome)
    }

    /// Close the context after `outcome`; the first failure wins.
    fn close_after<T>(&self, operation: &'static str, outcome: Result<T>) -> Result<T> {
        let closed = if self.has_connection() {
            self.close()
        } else {
            Ok(())
        };
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                tracing::warn!(operation, error = %close_err, "close after failed operation also failed");
                Err(err)
            }
        }
    }
}

/// Close this thread's connections whose manager has been dropped elsewhere.
fn close_orphaned_connections() {
    let orphans: Vec<(u64, ConnectionSlot)> = {
        let live = live_managers();
        CONTEXTS.with(|contexts| {
            let mut contexts = contexts.borrow_mut();
            let dead: Vec<u64> = contexts
                .keys()
                .copied()
                .filter(|id| !live.contains(id))
                .collect();
            dead.into_iter()
                .filter_map(|id| contexts.remove(&id).map(|slot| (id, slot)))
                .collect()
        })
    };
    for (id, slot) in orphans {
        if let Some(conn) = slot.take() {
            tracing::debug!(manager = id, "closing connection of dropped manager");
            if let Err(err) = conn.close() {
                tracing::warn!(manager = id, error = %err, "closing orphaned connection failed");
            }
        }
    }
}

impl Drop for SimpleDb {
    fn drop(&mut self) {
        live_managers().remove(&self.id);
        // Connections bound on other threads are released when those threads exit.
        let slot = CONTEXTS
            .try_with(|contexts| contexts.borrow_mut().remove(&self.id))
            .ok()
            .flatten();
        if let Some(conn) = slot.and_then(|slot| slot.take()) {
            if let Err(err) = conn.close() {
                tracing::warn!(manager = self.id, error = %err, "close on drop failed");
            }
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::params;

    fn memory_db() -> SimpleDb {
        SimpleDb::sqlite(":memory:", "scratch")
    }

    #[test]
    fn builders_share_the_thread_connection() -> Result<()> {
        let db = memory_db();
        assert!(!db.has_connection());
        db.sql()?.append("CREATE TABLE t (v INTEGER)", params![]).update()?;
        db.sql()?.append("INSERT INTO t VALUES (?)", params![5]).update()?;
        let v = db.sql()?.append("SELECT v FROM t", params![]).select_long()?;
        assert_eq!(v, Some(5));
        assert!(db.has_connection());
        db.close()?;
        assert!(!db.has_connection());
        Ok(())
    }

    #[test]
    fn begin_requires_an_open_connection() -> Result<()> {
        let db = memory_db();
        let err = db.begin_transaction().unwrap_err();
        assert!(matches!(
            err,
            SimpleDbError::TransactionError { operation: "begin", .. }
        ));
        assert!(!db.has_connection());

        db.sql()?;
        db.begin_transaction()?;
        db.rollback()?;
        Ok(())
    }

    #[test]
    fn close_without_connection_is_a_state_error() {
        let db = memory_db();
        assert!(matches!(db.close(), Err(SimpleDbError::StateError(_))));
    }

    #[test]
    fn commit_without_transaction_reports_and_closes() -> Result<()> {
        let db = memory_db();
        db.sql()?;
        let err = db.commit().unwrap_err();
        assert!(matches!(
            err,
            SimpleDbError::TransactionError { operation: "commit", .. }
        ));
        assert!(!db.has_connection());
        Ok(())
    }

    #[test]
    fn managers_do_not_share_connections() -> Result<()> {
        let a = memory_db();
        let b = memory_db();
        a.sql()?;
        assert!(a.has_connection());
        assert!(!b.has_connection());
        drop(a);
        assert!(!b.has_connection());
        Ok(())
    }
}
