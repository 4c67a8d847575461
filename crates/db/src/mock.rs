//! `MockDriver` — an in-memory test double for `Driver`.
//!
//! Useful in unit and integration tests where a live PostgreSQL server is
//! either unavailable or irrelevant. Tables are declared with a
//! [`TableSchema`] and enforce the same column, key and filter rules as
//! [`OpDb`](crate::OpDb); every call is recorded, and failures can be injected
//! per operation.

use std::collections::{HashMap, HashSet};
use std::io;

use async_trait::async_trait;
use serde_json::Value;

use crate::sql::strip_statement;
use crate::{DbError, Driver, Filter, Frame, Record, TableSchema};

struct MockTable {
    schema: TableSchema,
    rows: Vec<Record>,
}

impl MockTable {
    /// Full-width copy of `record`, missing columns as `null`.
    fn widen(&self, record: &Record) -> Record {
        self.schema
            .columns
            .iter()
            .map(|c| (c.name.clone(), record.get(&c.name).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    fn key_of(&self, record: &Record) -> Option<Vec<Value>> {
        let keys = self.schema.key_columns();
        if keys.is_empty() {
            return None;
        }
        Some(
            keys.iter()
                .map(|k| record.get(&k.name).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn frame(&self, rows: impl Iterator<Item = Record>) -> Result<Frame, DbError> {
        let mut frame = Frame::new(self.schema.names())?;
        for row in rows {
            frame.push_record(&row)?;
        }
        Ok(frame)
    }
}

/// A mock driver that records every call and serves rows from memory.
#[derive(Default)]
pub struct MockDriver {
    /// Descriptor the mock was built with. Never parsed.
    pub dbinfo: String,
    tables: HashMap<String, MockTable>,
    queries: HashMap<String, Frame>,
    connected: bool,
    connects: usize,
    closes: usize,
    calls: Vec<&'static str>,
    fail_connect: bool,
    fail_close: bool,
    fail_ops: HashSet<&'static str>,
}

impl MockDriver {
    pub fn new(dbinfo: impl Into<String>) -> Self {
        Self { dbinfo: dbinfo.into(), ..Self::default() }
    }

    /// Declare an empty table.
    pub fn with_table(mut self, schema: TableSchema) -> Self {
        self.tables
            .insert(schema.table.clone(), MockTable { schema, rows: Vec::new() });
        self
    }

    /// Seed rows into a declared table without going through `insert`.
    pub fn with_rows(mut self, table: &str, rows: Vec<Record>) -> Self {
        if let Some(t) = self.tables.get_mut(table) {
            let widened: Vec<Record> = rows.iter().map(|r| t.widen(r)).collect();
            t.rows.extend(widened);
        }
        self
    }

    /// Serve `frame` for `fetch_query(sql)`.
    pub fn with_query(mut self, sql: &str, frame: Frame) -> Self {
        self.queries.insert(strip_statement(sql).to_owned(), frame);
        self
    }

    /// Make `connect` fail as if the server were unreachable.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make `close` fail after releasing the connection.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Make the named operation (e.g. `"insert"`) fail with a query error.
    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_ops.insert(op);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of `connect` calls seen.
    pub fn connects(&self) -> usize {
        self.connects
    }

    /// Number of `close` calls seen.
    pub fn closes(&self) -> usize {
        self.closes
    }

    /// Operation names in call order.
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    /// Current contents of a table.
    pub fn table(&self, table: &str) -> Option<Frame> {
        let t = self.tables.get(table)?;
        t.frame(t.rows.iter().cloned()).ok()
    }

    fn enter(&mut self, op: &'static str) -> Result<(), DbError> {
        self.calls.push(op);
        if !self.connected {
            return Err(DbError::NotConnected);
        }
        if self.fail_ops.contains(op) {
            return Err(DbError::Query(sqlx::Error::Protocol(format!(
                "injected failure in {op}"
            ))));
        }
        Ok(())
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MockTable, DbError> {
        self.tables.get_mut(table).ok_or_else(|| undefined_table(table))
    }

    fn insert_records(&mut self, table: &str, records: &[Record]) -> Result<(), DbError> {
        let t = self.table_mut(table)?;
        let mut staged: Vec<Record> = Vec::with_capacity(records.len());
        for record in records {
            t.schema.check_columns(record.keys().map(String::as_str))?;
            let row = t.widen(record);
            if let Some(key) = t.key_of(&row) {
                let clash = t
                    .rows
                    .iter()
                    .chain(staged.iter())
                    .any(|existing| t.key_of(existing).as_ref() == Some(&key));
                if clash {
                    return Err(DbError::Query(sqlx::Error::Protocol(format!(
                        "duplicate key value violates primary key of '{table}'"
                    ))));
                }
            }
            staged.push(row);
        }
        t.rows.extend(staged);
        Ok(())
    }
}

fn undefined_table(table: &str) -> DbError {
    DbError::Query(sqlx::Error::Protocol(format!(
        "relation \"{table}\" does not exist"
    )))
}

#[async_trait]
impl Driver for MockDriver {
    async fn connect(&mut self) -> Result<(), DbError> {
        self.connects += 1;
        self.calls.push("connect");
        if self.fail_connect {
            return Err(DbError::connection(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        self.closes += 1;
        self.calls.push("close");
        self.connected = false;
        if self.fail_close {
            return Err(DbError::connection(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))));
        }
        Ok(())
    }

    async fn insert(&mut self, table: &str, frame: &Frame) -> Result<(), DbError> {
        self.enter("insert")?;
        self.insert_records(table, &frame.records())
    }

    async fn insert_mappings(&mut self, table: &str, records: &[Record]) -> Result<(), DbError> {
        self.enter("insert_mappings")?;
        self.insert_records(table, records)
    }

    async fn update(&mut self, table: &str, frame: &Frame) -> Result<(), DbError> {
        self.enter("update")?;
        let t = self.table_mut(table)?;
        t.schema.check_columns(frame.columns().iter().map(String::as_str))?;
        let keys: Vec<String> = t
            .schema
            .require_keys(frame.columns())?
            .iter()
            .map(|k| k.name.clone())
            .collect();

        for incoming in frame.records() {
            let target = t.rows.iter_mut().find(|row| {
                keys.iter().all(|k| row.get(k) == incoming.get(k))
            });
            if let Some(row) = target {
                for (col, value) in incoming {
                    if !keys.contains(&col) {
                        row.insert(col, value);
                    }
                }
            }
        }
        Ok(())
    }

    async fn fetch_all(&mut self, table: &str) -> Result<Frame, DbError> {
        self.enter("fetch_all")?;
        let t = self.table_mut(table)?;
        t.frame(t.rows.iter().cloned())
    }

    async fn fetch_query(&mut self, sql: &str) -> Result<Frame, DbError> {
        self.enter("fetch_query")?;
        self.queries
            .get(strip_statement(sql))
            .cloned()
            .ok_or_else(|| {
                DbError::Query(sqlx::Error::Protocol(format!("no canned result for: {sql}")))
            })
    }

    async fn fetch_by_id(&mut self, table: &str, filter: &Filter) -> Result<Frame, DbError> {
        self.enter("fetch_by_id")?;
        let t = self.table_mut(table)?;
        t.schema.check_columns(filter.columns())?;
        t.frame(t.rows.iter().filter(|row| filter.matches(row)).cloned())
    }

    async fn fetch_sps_exposures(&mut self, pfs_visit_id: i64) -> Result<Frame, DbError> {
        self.enter("fetch_sps_exposures")?;
        let id = Value::from(pfs_visit_id);
        let exp_type = {
            let visits = self.table_mut("sps_visit")?;
            visits
                .rows
                .iter()
                .find(|v| v.get("pfs_visit_id") == Some(&id))
                .and_then(|v| v.get("exp_type").cloned())
        };
        let Some(exp_type) = exp_type else {
            return Ok(Frame::default());
        };

        let exposures = self.table_mut("sps_exposure")?;
        let mut rows: Vec<Record> = exposures
            .rows
            .iter()
            .filter(|e| e.get("pfs_visit_id") == Some(&id))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.get("sps_camera_id").and_then(Value::as_i64));

        let mut columns = exposures.schema.names();
        columns.push("exp_type".to_string());
        let mut frame = Frame::new(columns)?;
        for mut row in rows {
            row.insert("exp_type".to_string(), exp_type.clone());
            frame.push_record(&row)?;
        }
        Ok(frame)
    }
}
