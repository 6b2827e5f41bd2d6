//! Thread-scoped database access with a fluent statement builder.
//!
//! A [`SimpleDb`] hands each thread its own connection. Statements are built
//! with [`SqlBuilder`] from `?`-positional fragments and run through a
//! pluggable [`Driver`]; `SQLite` and `PostgreSQL` drivers ship behind the
//! `sqlite` and `postgres` features.
//!
//! ```rust,no_run
//! # #[cfg(feature = "sqlite")] {
//! use simple_db::prelude::*;
//!
//! # fn main() -> Result<(), SimpleDbError> {
//! let db = SimpleDb::sqlite("/tmp", "app.db");
//! let open = db
//!     .sql()?
//!     .append("SELECT COUNT(*) FROM article WHERE is_blind = ?", params![false])
//!     .select_long()?;
//! db.close()?;
//! # let _ = open;
//! # Ok(())
//! # }
//! # }
//! ```

pub mod config;
mod context;
pub mod driver;
pub mod error;
pub mod mapping;
pub mod prelude;
mod query_builder;
pub mod results;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::DbConfig;
pub use context::SimpleDb;
pub use driver::{ConnectTarget, Driver, DriverConnection};
pub use error::{DriverError, Result, SimpleDbError};
pub use mapping::{FromRow, FromValue};
pub use query_builder::SqlBuilder;
pub use results::Row;
pub use types::{DatabaseType, RowValues, ValueError};
