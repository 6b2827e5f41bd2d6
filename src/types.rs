use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Values that can be stored in a database row or bound as statement parameters.
///
/// The same enum flows in both directions so builders and mappers never branch on
/// driver types:
/// ```rust
/// use simple_db::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

/// A value could not be coerced into the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {found} to {expected}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: String,
}

impl ValueError {
    #[must_use]
    pub fn new(expected: &'static str, value: &RowValues) -> Self {
        Self {
            expected,
            found: format!("{} ({value})", value.type_name()),
        }
    }
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "integer",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "boolean",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    /// Timestamp value, parsing text in the common `YYYY-MM-DD HH:MM:SS[.fff]` shapes.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Integer coercion used by the typed accessors.
    ///
    /// Floats truncate toward zero, booleans become `0`/`1`, text must parse.
    ///
    /// # Errors
    /// Returns `ValueError` for timestamps, blobs, JSON, and unparsable text.
    pub fn to_i64(&self) -> Result<Option<i64>, ValueError> {
        match self {
            RowValues::Null => Ok(None),
            RowValues::Int(i) => Ok(Some(*i)),
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) => Ok(Some(*f as i64)),
            RowValues::Bool(b) => Ok(Some(i64::from(*b))),
            RowValues::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ValueError::new("integer", self)),
            _ => Err(ValueError::new("integer", self)),
        }
    }

    /// Float coercion; integers widen, text must parse.
    ///
    /// # Errors
    /// Returns `ValueError` for non-numeric values.
    pub fn to_f64(&self) -> Result<Option<f64>, ValueError> {
        match self {
            RowValues::Null => Ok(None),
            RowValues::Float(f) => Ok(Some(*f)),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(i) => Ok(Some(*i as f64)),
            RowValues::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ValueError::new("float", self)),
            _ => Err(ValueError::new("float", self)),
        }
    }

    /// Boolean coercion: numeric zero is false, any other number true, anything
    /// else is true only when its text form equals `true` ignoring case.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            RowValues::Null => None,
            RowValues::Bool(b) => Some(*b),
            RowValues::Int(i) => Some(*i != 0),
            RowValues::Float(f) => Some(*f != 0.0),
            other => Some(other.to_string().eq_ignore_ascii_case("true")),
        }
    }

    /// Text form of any non-null value.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            RowValues::Null => None,
            RowValues::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Timestamp coercion; text is parsed, dates-only become midnight.
    ///
    /// # Errors
    /// Returns `ValueError` when the value is not temporal.
    pub fn to_timestamp(&self) -> Result<Option<NaiveDateTime>, ValueError> {
        match self {
            RowValues::Null => Ok(None),
            other => other
                .as_timestamp()
                .map(Some)
                .ok_or_else(|| ValueError::new("timestamp", self)),
        }
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for RowValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValues::Int(i) => write!(f, "{i}"),
            RowValues::Float(v) => write!(f, "{v}"),
            RowValues::Text(s) => f.write_str(s),
            RowValues::Bool(b) => write!(f, "{b}"),
            RowValues::Timestamp(dt) => write!(f, "{}", dt.format("%F %T%.f")),
            RowValues::Null => f.write_str("NULL"),
            RowValues::JSON(v) => write!(f, "{v}"),
            RowValues::Blob(bytes) => {
                f.write_str("x'")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

impl Serialize for RowValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValues::Int(i) => serializer.serialize_i64(*i),
            RowValues::Float(v) => serializer.serialize_f64(*v),
            RowValues::Text(s) => serializer.serialize_str(s),
            RowValues::Bool(b) => serializer.serialize_bool(*b),
            RowValues::Timestamp(dt) => dt.serialize(serializer),
            RowValues::Null => serializer.serialize_none(),
            RowValues::JSON(v) => v.serialize(serializer),
            RowValues::Blob(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}

macro_rules! row_value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    RowValues::$variant(value.into())
                }
            }
        )+
    };
}

row_value_from!(Int: i64, i32, i16, i8, u32, u16, u8);
row_value_from!(Float: f64, f32);
row_value_from!(Text: String, &str, &String);
row_value_from!(Bool: bool);
row_value_from!(Timestamp: NaiveDateTime);
row_value_from!(JSON: JsonValue);
row_value_from!(Blob: Vec<u8>, &[u8]);

impl From<NaiveDate> for RowValues {
    fn from(value: NaiveDate) -> Self {
        RowValues::Timestamp(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<&RowValues> for RowValues {
    fn from(value: &RowValues) -> Self {
        value.clone()
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Build a `Vec<RowValues>` from heterogeneous values.
///
/// ```rust
/// use simple_db::{params, RowValues};
///
/// let bound = params![1, "title", false, None::<i64>];
/// assert_eq!(bound[1], RowValues::Text("title".into()));
/// assert!(bound[3].is_null());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::RowValues>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::RowValues::from($value)),+]
    };
}

/// The database backend a manager talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `SQLite` through `rusqlite`
    #[cfg(feature = "sqlite")]
    Sqlite,
    /// `PostgreSQL` through `tokio-postgres`
    #[cfg(feature = "postgres")]
    Postgres,
}
