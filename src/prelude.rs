//! Convenient imports for common functionality.

pub use crate::config::DbConfig;
pub use crate::context::SimpleDb;
pub use crate::error::SimpleDbError;
pub use crate::mapping::{FromRow, FromValue};
pub use crate::query_builder::SqlBuilder;
pub use crate::results::Row;
pub use crate::types::{DatabaseType, RowValues};
pub use crate::{impl_from_row, params};
