//! `SQLite` driver backed by `rusqlite`.

mod connection;
mod params;
mod query;

pub use connection::{SqliteConnection, SqliteDriver};
pub use params::{Params, row_value_to_sqlite_value};
pub use query::{DeclaredKind, decode_value};
