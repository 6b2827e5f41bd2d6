//! Conversion of result rows into caller types.
//!
//! [`FromValue`] turns one column value into a Rust value; [`FromRow`] turns a
//! whole [`Row`] into a record. Most records implement [`FromRow`] through
//! [`impl_from_row!`](crate::impl_from_row), which matches fields to columns
//! by exact, case-sensitive name.

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SimpleDbError;
use crate::results::Row;
use crate::types::{RowValues, ValueError};

/// Conversion from a single column value.
pub trait FromValue: Sized {
    /// # Errors
    /// Returns `ValueError` when the value has no sensible conversion,
    /// including SQL NULL into a non-`Option` type.
    fn from_value(value: &RowValues) -> Result<Self, ValueError>;
}

/// Conversion from a whole result row.
pub trait FromRow: Sized {
    /// # Errors
    /// Returns `SimpleDbError::MappingError` naming the offending column.
    fn from_row(row: &Row) -> Result<Self, SimpleDbError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, SimpleDbError> {
        Ok(row.clone())
    }
}

impl FromValue for RowValues {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        match value {
            RowValues::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        value
            .to_i64()?
            .ok_or_else(|| ValueError::new("integer", value))
    }
}

macro_rules! from_value_narrowed {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &RowValues) -> Result<Self, ValueError> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| ValueError::new($name, value))
                }
            }
        )+
    };
}

from_value_narrowed!(i32 => "i32", i16 => "i16", u32 => "u32", u64 => "u64", usize => "usize");

impl FromValue for f64 {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        value
            .to_f64()?
            .ok_or_else(|| ValueError::new("float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        value
            .to_bool()
            .ok_or_else(|| ValueError::new("boolean", value))
    }
}

impl FromValue for String {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        value
            .to_text()
            .ok_or_else(|| ValueError::new("text", value))
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        value
            .to_timestamp()?
            .ok_or_else(|| ValueError::new("timestamp", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        match value {
            RowValues::Blob(bytes) => Ok(bytes.clone()),
            RowValues::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(ValueError::new("blob", other)),
        }
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &RowValues) -> Result<Self, ValueError> {
        match value {
            RowValues::JSON(json) => Ok(json.clone()),
            // SQLite stores JSON as text.
            RowValues::Text(s) => serde_json::from_str(s).map_err(|_| ValueError::new("json", value)),
            other => serde_json::to_value(other).map_err(|_| ValueError::new("json", other)),
        }
    }
}

/// Implement [`FromRow`] for a struct with public-to-the-caller fields and a
/// `Default` impl.
///
/// Each listed field is filled from the column of the same name, or from the
/// column given after `=>`. Columns missing from the row leave the field at
/// its default; columns the struct does not list are ignored.
///
/// ```rust
/// use chrono::NaiveDateTime;
/// use simple_db::{FromRow, Row, RowValues, impl_from_row};
///
/// #[derive(Debug, Default)]
/// struct Article {
///     id: i64,
///     title: String,
///     created_date: Option<NaiveDateTime>,
///     is_blind: bool,
/// }
///
/// impl_from_row!(Article {
///     id,
///     title,
///     created_date => "createdDate",
///     is_blind => "isBlind",
/// });
///
/// let row = Row::from_pairs([
///     ("id", RowValues::Int(1)),
///     ("title", "hello".into()),
///     ("isBlind", RowValues::Int(0)),
/// ]);
/// let article = Article::from_row(&row).unwrap();
/// assert_eq!(article.title, "hello");
/// assert!(!article.is_blind);
/// assert!(article.created_date.is_none());
/// ```
#[macro_export]
macro_rules! impl_from_row {
    (@column $field:ident) => {
        ::std::stringify!($field)
    };
    (@column $field:ident $column:literal) => {
        $column
    };
    ($target:ident { $($field:ident $(=> $column:literal)?),* $(,)? }) => {
        impl $crate::FromRow for $target {
            fn from_row(row: &$crate::Row) -> ::std::result::Result<Self, $crate::SimpleDbError> {
                let mut mapped = <$target as ::std::default::Default>::default();
                $(
                    let column: &str = $crate::impl_from_row!(@column $field $($column)?);
                    if let ::std::option::Option::Some(value) = row.get(column) {
                        mapped.$field = $crate::FromValue::from_value(value).map_err(|source| {
                            $crate::SimpleDbError::MappingError {
                                target: ::std::stringify!($target),
                                column: column.to_string(),
                                source,
                            }
                        })?;
                    }
                )*
                ::std::result::Result::Ok(mapped)
            }
        }
    };
}
