//! `PostgreSQL` driver backed by `tokio-postgres`.

mod connection;
mod params;
mod query;

pub use connection::{PostgresConnection, PostgresDriver};
pub use params::as_refs;
pub use query::{build_rows_from_statement, postgres_extract_value};
