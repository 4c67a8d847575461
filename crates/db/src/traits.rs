//! The `Driver` trait — the contract every database client must fulfil.

use async_trait::async_trait;

use crate::{DbError, Filter, Frame, Record};

/// A database client holding at most one open connection.
///
/// Data operations on a client that is not connected fail with
/// [`DbError::NotConnected`]. `close` on a closed client is a no-op.
#[async_trait]
pub trait Driver: Send {
    /// Open the connection described by the client's descriptor.
    async fn connect(&mut self) -> Result<(), DbError>;

    /// Release the connection, if one is open.
    async fn close(&mut self) -> Result<(), DbError>;

    /// Insert every row of `frame`. Column labels must name existing columns.
    async fn insert(&mut self, table: &str, frame: &Frame) -> Result<(), DbError>;

    /// Insert one row per record. Keys a record omits take the column default.
    async fn insert_mappings(&mut self, table: &str, records: &[Record]) -> Result<(), DbError>;

    /// Update rows identified by the table's primary key columns in `frame`.
    async fn update(&mut self, table: &str, frame: &Frame) -> Result<(), DbError>;

    /// Every row and column of `table`.
    async fn fetch_all(&mut self, table: &str) -> Result<Frame, DbError>;

    /// Result of an arbitrary read query. The text is executed as given.
    async fn fetch_query(&mut self, sql: &str) -> Result<Frame, DbError>;

    /// Rows of `table` matching every term of `filter`.
    async fn fetch_by_id(&mut self, table: &str, filter: &Filter) -> Result<Frame, DbError>;

    /// SpS exposures of one visit, joined with the visit's exposure type.
    async fn fetch_sps_exposures(&mut self, pfs_visit_id: i64) -> Result<Frame, DbError>;
}
