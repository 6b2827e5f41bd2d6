use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::Statement;

use crate::error::DriverError;
use crate::results::{Columns, Row};
use crate::types::{RowValues, parse_timestamp};

use super::params::Params;

/// How a column's declared type steers decoding of `SQLite`'s storage classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    Boolean,
    Temporal,
    Other,
}

impl DeclaredKind {
    pub fn from_decl(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return DeclaredKind::Other;
        };
        let decl = decl.to_ascii_uppercase();
        if decl.contains("BOOL") {
            DeclaredKind::Boolean
        } else if decl.contains("DATE") || decl.contains("TIME") {
            DeclaredKind::Temporal
        } else {
            DeclaredKind::Other
        }
    }
}

/// Decode one stored value into `RowValues`.
///
/// Integers in `BOOLEAN` columns become `Bool`; parsable text in `DATE`/`TIME`
/// columns becomes `Timestamp`. Everything else keeps its storage class.
#[must_use]
pub fn decode_value(value: Value, kind: DeclaredKind) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) if kind == DeclaredKind::Boolean => RowValues::Bool(i != 0),
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) if kind == DeclaredKind::Temporal => match parse_timestamp(&s) {
            Some(dt) => RowValues::Timestamp(dt),
            None => RowValues::Text(s),
        },
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}

/// Run a prepared query and collect every row.
///
/// # Errors
/// Returns `DriverError::Sqlite` if binding, stepping, or reading a column fails.
pub fn build_rows(stmt: &mut Statement<'_>, params: &Params) -> Result<Vec<Row>, DriverError> {
    let (names, kinds): (Vec<String>, Vec<DeclaredKind>) = stmt
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), DeclaredKind::from_decl(col.decl_type())))
        .unzip();
    let columns = Columns::new(names);

    let mut rows_iter = stmt.query(params.as_bindable())?;
    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(kinds.len());
        for (idx, kind) in kinds.iter().enumerate() {
            let raw: Value = row.get(idx)?;
            values.push(decode_value(raw, *kind));
        }
        rows.push(Row::new(Arc::clone(&columns), values));
    }

    Ok(rows)
}
