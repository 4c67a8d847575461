//! `db` crate — the database client behind the opdb facade.
//!
//! Provides the [`Driver`] trait, its PostgreSQL implementation [`OpDb`],
//! the tabular payload types, and an in-memory [`MockDriver`] for tests.
//! No connection pooling and no retries live here.

pub mod error;
pub mod connection;
pub mod models;
pub mod schema;
pub mod sql;
pub mod traits;
pub mod mock;

pub use connection::OpDb;
pub use error::DbError;
pub use models::{Filter, Frame, Record};
pub use schema::{ColumnInfo, TableSchema};
pub use traits::Driver;
pub use mock::MockDriver;

#[cfg(test)]
mod sql_tests;
