use std::fmt;

use chrono::NaiveDateTime;

use crate::context::ConnectionSlot;
use crate::driver::DriverConnection;
use crate::error::{DriverError, Result, SimpleDbError};
use crate::mapping::FromRow;
use crate::results::Row;
use crate::translation::expand_in_list;
use crate::types::{RowValues, ValueError};

/// Fluent builder for one statement at a time.
///
/// Fragments are joined with a single space and parameters accumulate in
/// order. Every terminal operation clears the buffer before it touches the
/// database, so a builder can be reused and a failed statement never leaks
/// into the next one.
pub struct SqlBuilder {
    slot: ConnectionSlot,
    dev_mode: bool,
    sql: String,
    params: Vec<RowValues>,
    deferred: Option<SimpleDbError>,
}

impl fmt::Debug for SqlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlBuilder")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}

impl SqlBuilder {
    pub(crate) fn new(slot: ConnectionSlot, dev_mode: bool) -> Self {
        Self {
            slot,
            dev_mode,
            sql: String::new(),
            params: Vec::new(),
            deferred: None,
        }
    }

    /// Append a fragment and its parameters.
    pub fn append<P>(&mut self, fragment: &str, params: P) -> &mut Self
    where
        P: IntoIterator,
        P::Item: Into<RowValues>,
    {
        if !self.sql.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str(fragment);
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Append a fragment whose single `?` expands to one placeholder per value.
    ///
    /// A fragment without exactly one `?`, or an empty value list, is not
    /// appended; the next terminal operation reports `InListError` instead.
    ///
    /// ```rust,no_run
    /// # #[cfg(feature = "sqlite")] {
    /// # use simple_db::prelude::*;
    /// # fn main() -> Result<(), SimpleDbError> {
    /// # let db = SimpleDb::sqlite(":memory:", "app");
    /// let titles = db
    ///     .sql()?
    ///     .append("SELECT title FROM article WHERE is_blind = ?", params![false])
    ///     .append_in("AND id IN (?)", [1, 2, 3])
    ///     .select_rows()?;
    /// # let _ = titles;
    /// # Ok(())
    /// # }
    /// # }
    /// ```
    pub fn append_in<P>(&mut self, fragment: &str, params: P) -> &mut Self
    where
        P: IntoIterator,
        P::Item: Into<RowValues>,
    {
        let values: Vec<RowValues> = params.into_iter().map(Into::into).collect();
        match expand_in_list(fragment, values.len()) {
            Ok(expanded) => self.append(&expanded, values),
            Err(issue) => {
                if self.deferred.is_none() {
                    self.deferred = Some(SimpleDbError::InListError {
                        fragment: fragment.to_string(),
                        reason: issue.to_string(),
                    });
                }
                self
            }
        }
    }

    /// The statement accumulated so far.
    #[must_use]
    pub fn sql_text(&self) -> &str {
        &self.sql
    }

    /// The parameters accumulated so far, in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[RowValues] {
        &self.params
    }

    /// Execute an INSERT and return the generated key, or `0` when the
    /// driver reports none.
    ///
    /// # Errors
    /// See [`SqlBuilder::update`].
    pub fn insert(&mut self) -> Result<i64> {
        self.run(|conn, sql, params| conn.execute_returning_key(sql, params))
            .map(|key| key.unwrap_or(0))
    }

    /// Execute a statement and return the affected-row count.
    ///
    /// # Errors
    /// `InListError` from a rejected [`SqlBuilder::append_in`], `StateError`
    /// when the context was closed, `ExecutionError` for driver failures.
    pub fn update(&mut self) -> Result<usize> {
        self.run(|conn, sql, params| conn.execute(sql, params))
    }

    /// Alias of [`SqlBuilder::update`].
    ///
    /// # Errors
    /// See [`SqlBuilder::update`].
    pub fn delete(&mut self) -> Result<usize> {
        self.update()
    }

    /// # Errors
    /// See [`SqlBuilder::update`].
    pub fn select_rows(&mut self) -> Result<Vec<Row>> {
        self.run(|conn, sql, params| conn.query(sql, params))
    }

    /// The first row, if any.
    ///
    /// # Errors
    /// See [`SqlBuilder::update`].
    pub fn select_row(&mut self) -> Result<Option<Row>> {
        Ok(self.select_rows()?.into_iter().next())
    }

    /// # Errors
    /// Execution failures as for [`SqlBuilder::update`], plus `MappingError`.
    pub fn select_rows_as<T: FromRow>(&mut self) -> Result<Vec<T>> {
        self.select_rows()?.iter().map(T::from_row).collect()
    }

    /// # Errors
    /// Execution failures as for [`SqlBuilder::update`], plus `MappingError`.
    pub fn select_row_as<T: FromRow>(&mut self) -> Result<Option<T>> {
        self.select_row()?.as_ref().map(T::from_row).transpose()
    }

    /// First column of every row as an integer; SQL NULL stays `None`.
    ///
    /// # Errors
    /// See [`SqlBuilder::update`]; non-numeric values are `ExecutionError`s.
    pub fn select_longs(&mut self) -> Result<Vec<Option<i64>>> {
        self.run(|conn, sql, params| {
            conn.query(sql, params)?
                .iter()
                .map(|row| row.first_value().map_or(Ok(None), RowValues::to_i64))
                .collect::<std::result::Result<_, ValueError>>()
                .map_err(DriverError::from)
        })
    }

    /// # Errors
    /// See [`SqlBuilder::select_longs`].
    pub fn select_long(&mut self) -> Result<Option<i64>> {
        self.select_first(RowValues::to_i64)
    }

    /// # Errors
    /// See [`SqlBuilder::update`].
    pub fn select_string(&mut self) -> Result<Option<String>> {
        self.select_first(|value| Ok(value.to_text()))
    }

    /// Numeric zero is `false`; text must read `true` ignoring case.
    ///
    /// # Errors
    /// See [`SqlBuilder::update`].
    pub fn select_boolean(&mut self) -> Result<Option<bool>> {
        self.select_first(|value| Ok(value.to_bool()))
    }

    /// # Errors
    /// See [`SqlBuilder::update`]; non-temporal values are `ExecutionError`s.
    pub fn select_datetime(&mut self) -> Result<Option<NaiveDateTime>> {
        self.select_first(RowValues::to_timestamp)
    }

    fn select_first<T>(
        &mut self,
        coerce: impl FnOnce(&RowValues) -> std::result::Result<Option<T>, ValueError>,
    ) -> Result<Option<T>> {
        self.run(|conn, sql, params| {
            let rows = conn.query(sql, params)?;
            match rows.first().and_then(Row::first_value) {
                Some(value) => Ok(coerce(value)?),
                None => Ok(None),
            }
        })
    }

    fn run<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut dyn DriverConnection, &str, &[RowValues]) -> std::result::Result<T, DriverError>,
    {
        let sql = std::mem::take(&mut self.sql);
        let params = std::mem::take(&mut self.params);
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if self.dev_mode {
            tracing::info!(sql = %sql, params = ?params, "SQL");
        }

        let mut guard = self.slot.borrow_mut();
        let Some(conn) = guard.as_deref_mut() else {
            return Err(SimpleDbError::StateError(
                "statement builder used after its connection was closed".into(),
            ));
        };
        let outcome = op(conn, &sql, &params);
        outcome.map_err(|source| SimpleDbError::execution(sql, source))
    }
}
