//! In-memory shapes exchanged with the database.
//!
//! A [`Frame`] is a column-labelled row set; a [`Record`] is a single row keyed
//! by column; a [`Filter`] is a conjunction of column equality predicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DbError;

/// One row keyed by column label, in column order.
pub type Record = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A tabular payload: ordered, unique column labels and row-major cells.
///
/// Every row holds exactly one cell per column. Both invariants are enforced
/// on construction, so code consuming a `Frame` can index freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = DbError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        let mut frame = Frame::new(raw.columns)?;
        for row in raw.rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }
}

impl Frame {
    /// Create an empty frame with the given column labels.
    pub fn new<I, S>(columns: I) -> Result<Self, DbError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].contains(col) {
                return Err(DbError::InvalidFrame(format!("duplicate column '{col}'")));
            }
        }
        Ok(Self { columns, rows: Vec::new() })
    }

    /// Build a frame from records.
    ///
    /// Columns are the union of all record keys in first-seen order; keys a
    /// record lacks become `null`.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let records: Vec<&Record> = records.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| record.get(col).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Append a row. Fails if its width differs from the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), DbError> {
        if row.len() != self.columns.len() {
            return Err(DbError::InvalidFrame(format!(
                "row {} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a record, mapping keys onto the existing columns.
    ///
    /// Keys outside the frame's columns are rejected; missing keys become `null`.
    pub fn push_record(&mut self, record: &Record) -> Result<(), DbError> {
        if let Some(extra) = record.keys().find(|k| !self.columns.contains(k)) {
            return Err(DbError::InvalidFrame(format!("unknown column '{extra}'")));
        }
        let row = self
            .columns
            .iter()
            .map(|col| record.get(col).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column label.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Every cell of one column, top to bottom.
    pub fn column(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.position(column)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// A single cell by row index and column label.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.position(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rows as records, in row order.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Whether some row equals `record` on every key of `record`.
    pub fn contains_record(&self, record: &Record) -> bool {
        self.records().iter().any(|row| {
            record
                .iter()
                .all(|(k, v)| row.get(k).is_some_and(|cell| cell == v))
        })
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Equality predicates over columns, combined with AND.
///
/// A `null` value matches SQL `NULL`. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column = value`. A later term on the same column replaces the earlier one.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.terms.iter_mut().find(|(c, _)| *c == column) {
            Some(term) => term.1 = value,
            None => self.terms.push((column, value)),
        }
        self
    }

    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(c, _)| c.as_str())
    }

    /// Evaluate the filter against a record the way the database would.
    pub fn matches(&self, record: &Record) -> bool {
        self.terms
            .iter()
            .all(|(col, want)| match record.get(col) {
                Some(have) => have == want,
                None => false,
            })
    }
}

impl<K, V> FromIterator<(K, V)> for Filter
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Filter::new(), |filter, (k, v)| filter.eq(k, v))
    }
}

impl From<Record> for Filter {
    fn from(record: Record) -> Self {
        record.into_iter().collect()
    }
}
