//! One function per database operation.
//!
//! Every function follows the same three steps:
//! 1. Build a client bound to the connection descriptor.
//! 2. Connect and run exactly one driver operation.
//! 3. Close the client, whether or not steps 1–2 succeeded.
//!
//! Errors are never translated; the driver's error is returned once the
//! connection has been released. The `*_with` variants take any [`Driver`]
//! and are what the descriptor-based functions delegate to.

use std::slice;

use db::{DbError, Driver, Filter, Frame, OpDb, Record};
use tracing::{instrument, warn};

/// Close `db` and merge the outcome with the operation's result.
///
/// An operation error wins over a close error; the latter is only logged.
async fn release<D: Driver, T>(db: &mut D, result: Result<T, DbError>) -> Result<T, DbError> {
    let closed = db.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!("failed to close connection after error: {}", close_err);
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// insert / update
// ---------------------------------------------------------------------------

/// Insert one row into `table`.
///
/// `row` keys must be columns of the table; omitted columns take their defaults.
#[instrument(skip(url, row))]
pub async fn insert_row(url: &str, table: &str, row: &Record) -> Result<(), DbError> {
    insert_row_with(&mut OpDb::new(url), table, row).await
}

pub async fn insert_row_with<D: Driver>(db: &mut D, table: &str, row: &Record) -> Result<(), DbError> {
    let result = async {
        db.connect().await?;
        db.insert_mappings(table, slice::from_ref(row)).await
    }
    .await;
    release(db, result).await
}

/// Insert every row of `frame` into `table`.
///
/// Column labels of `frame` must be exactly the table's column names.
#[instrument(skip(url, frame), fields(rows = frame.len()))]
pub async fn insert(url: &str, table: &str, frame: &Frame) -> Result<(), DbError> {
    insert_with(&mut OpDb::new(url), table, frame).await
}

pub async fn insert_with<D: Driver>(db: &mut D, table: &str, frame: &Frame) -> Result<(), DbError> {
    let result = async {
        db.connect().await?;
        db.insert(table, frame).await
    }
    .await;
    release(db, result).await
}

/// Update rows of `table`, matching on its primary key.
///
/// `frame` must carry every primary key column; its other columns are written.
#[instrument(skip(url, frame), fields(rows = frame.len()))]
pub async fn update(url: &str, table: &str, frame: &Frame) -> Result<(), DbError> {
    update_with(&mut OpDb::new(url), table, frame).await
}

pub async fn update_with<D: Driver>(db: &mut D, table: &str, frame: &Frame) -> Result<(), DbError> {
    let result = async {
        db.connect().await?;
        db.update(table, frame).await
    }
    .await;
    release(db, result).await
}

// ---------------------------------------------------------------------------
// fetch
// ---------------------------------------------------------------------------

/// Every row of `table`.
#[instrument(skip(url))]
pub async fn fetch_all(url: &str, table: &str) -> Result<Frame, DbError> {
    fetch_all_with(&mut OpDb::new(url), table).await
}

pub async fn fetch_all_with<D: Driver>(db: &mut D, table: &str) -> Result<Frame, DbError> {
    let result = async {
        db.connect().await?;
        db.fetch_all(table).await
    }
    .await;
    release(db, result).await
}

/// Result of a raw SQL read query.
///
/// The text is executed as given: the caller is responsible for its
/// correctness and for keeping untrusted input out of it.
#[instrument(skip(url))]
pub async fn fetch_query(url: &str, query: &str) -> Result<Frame, DbError> {
    fetch_query_with(&mut OpDb::new(url), query).await
}

pub async fn fetch_query_with<D: Driver>(db: &mut D, query: &str) -> Result<Frame, DbError> {
    let result = async {
        db.connect().await?;
        db.fetch_query(query).await
    }
    .await;
    release(db, result).await
}

/// Rows of `table` where every column in `filter` equals its value,
/// e.g. `Filter::new().eq("pfs_visit_id", 12345)`.
#[instrument(skip(url))]
pub async fn fetch_by_id(url: &str, table: &str, filter: &Filter) -> Result<Frame, DbError> {
    fetch_by_id_with(&mut OpDb::new(url), table, filter).await
}

pub async fn fetch_by_id_with<D: Driver>(
    db: &mut D,
    table: &str,
    filter: &Filter,
) -> Result<Frame, DbError> {
    let result = async {
        db.connect().await?;
        db.fetch_by_id(table, filter).await
    }
    .await;
    release(db, result).await
}

/// SpS exposures of a visit, with the visit's exposure type.
#[instrument(skip(url))]
pub async fn fetch_sps_exposures(url: &str, pfs_visit_id: i64) -> Result<Frame, DbError> {
    fetch_sps_exposures_with(&mut OpDb::new(url), pfs_visit_id).await
}

pub async fn fetch_sps_exposures_with<D: Driver>(
    db: &mut D,
    pfs_visit_id: i64,
) -> Result<Frame, DbError> {
    let result = async {
        db.connect().await?;
        db.fetch_sps_exposures(pfs_visit_id).await
    }
    .await;
    release(db, result).await
}
