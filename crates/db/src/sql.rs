//! SQL statement construction.
//!
//! Cells travel as text parameters and are cast to the destination column's
//! type on the server, so a single bind type covers every column. Identifiers
//! are always quoted.

use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::{DbError, Filter, Frame, TableSchema};

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// The SpS exposure view: every `sps_exposure` column plus the visit's
/// `exp_type`, for one `pfs_visit_id`.
pub const SPS_EXPOSURES_SQL: &str = r#"
    SELECT e.*, v.exp_type
    FROM sps_exposure e
    JOIN sps_visit v ON v.pfs_visit_id = e.pfs_visit_id
    WHERE e.pfs_visit_id = $1
    ORDER BY e.sps_camera_id
"#;

pub type Statement = QueryBuilder<'static, Postgres>;

/// Quote one identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name part by part.
pub fn quote_table(table: &str) -> String {
    table.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Drop trailing whitespace and semicolons so the text can be nested.
pub fn strip_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Wrap a read query so each result row comes back as one JSON object.
///
/// The closing parenthesis goes on its own line so a trailing `--` comment
/// in `inner` cannot swallow it.
pub fn rows_as_json(inner: &str) -> String {
    format!("SELECT row_to_json(t)::text FROM ({inner}\n) AS t")
}

/// Text form of a cell for a column of `sql_type`. `None` is SQL NULL.
pub fn render_cell(value: &Value, sql_type: &str) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if sql_type.ends_with("[]") => Some(array_literal(items)),
        other => Some(other.to_string()),
    }
}

fn array_literal(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Array(inner) => array_literal(inner),
            Value::String(s) => quote_array_element(s),
            Value::Object(_) => quote_array_element(&item.to_string()),
            other => other.to_string(),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn quote_array_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn push_cast(builder: &mut Statement, value: &Value, sql_type: &str) {
    builder.push("CAST(");
    builder.push_bind(render_cell(value, sql_type));
    builder.push(format!(" AS {sql_type})"));
}

fn column_types<'a>(schema: &'a TableSchema, frame: &Frame) -> Result<Vec<&'a str>, DbError> {
    schema.check_columns(frame.columns().iter().map(String::as_str))?;
    Ok(frame
        .columns()
        .iter()
        .filter_map(|c| schema.column(c).map(|info| info.sql_type.as_str()))
        .collect())
}

/// Multi-row INSERT statements covering every row of `frame`, chunked to
/// stay under [`MAX_BIND_PARAMS`].
pub fn insert_statements(schema: &TableSchema, frame: &Frame) -> Result<Vec<Statement>, DbError> {
    let types = column_types(schema, frame)?;
    let table = quote_table(&schema.table);

    if frame.columns().is_empty() {
        return Ok(frame
            .rows()
            .iter()
            .map(|_| QueryBuilder::new(format!("INSERT INTO {table} DEFAULT VALUES")))
            .collect());
    }

    let column_list = frame
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let rows_per_statement = MAX_BIND_PARAMS / frame.columns().len();

    let statements = frame
        .rows()
        .chunks(rows_per_statement)
        .map(|chunk| {
            let mut builder = QueryBuilder::new(format!("INSERT INTO {table} ({column_list}) VALUES "));
            for (r, row) in chunk.iter().enumerate() {
                if r > 0 {
                    builder.push(", ");
                }
                builder.push("(");
                for (i, (cell, sql_type)) in row.iter().zip(&types).enumerate() {
                    if i > 0 {
                        builder.push(", ");
                    }
                    push_cast(&mut builder, cell, sql_type);
                }
                builder.push(")");
            }
            builder
        })
        .collect();
    Ok(statements)
}

/// One UPDATE per row, setting non-key columns where the key columns match.
///
/// A frame with nothing but key columns yields no statements.
pub fn update_statements(schema: &TableSchema, frame: &Frame) -> Result<Vec<Statement>, DbError> {
    let types = column_types(schema, frame)?;
    let keys = schema.require_keys(frame.columns())?;
    let table = quote_table(&schema.table);

    let is_key = |col: &str| keys.iter().any(|k| k.name == col);
    if frame.columns().iter().all(|c| is_key(c)) {
        return Ok(Vec::new());
    }

    let statements = frame
        .rows()
        .iter()
        .map(|row| {
            let mut builder = QueryBuilder::new(format!("UPDATE {table} SET "));
            let mut first = true;
            for ((col, cell), sql_type) in frame.columns().iter().zip(row).zip(&types) {
                if is_key(col) {
                    continue;
                }
                if !first {
                    builder.push(", ");
                }
                first = false;
                builder.push(format!("{} = ", quote_ident(col)));
                push_cast(&mut builder, cell, sql_type);
            }
            builder.push(" WHERE ");
            let mut first = true;
            for ((col, cell), sql_type) in frame.columns().iter().zip(row).zip(&types) {
                if !is_key(col) {
                    continue;
                }
                if !first {
                    builder.push(" AND ");
                }
                first = false;
                builder.push(format!("{} = ", quote_ident(col)));
                push_cast(&mut builder, cell, sql_type);
            }
            builder
        })
        .collect();
    Ok(statements)
}

/// Every row of the table as JSON objects.
pub fn select_all(schema: &TableSchema) -> String {
    format!(
        "SELECT row_to_json(t)::text FROM (SELECT * FROM {}) AS t",
        quote_table(&schema.table)
    )
}

/// Rows matching `filter` as JSON objects. `null` terms compile to `IS NULL`.
pub fn select_by_filter(schema: &TableSchema, filter: &Filter) -> Result<Statement, DbError> {
    schema.check_columns(filter.columns())?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT row_to_json(t)::text FROM (SELECT * FROM {}",
        quote_table(&schema.table)
    ));
    for (i, (col, value)) in filter.terms().iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        builder.push(quote_ident(col));
        if value.is_null() {
            builder.push(" IS NULL");
        } else {
            builder.push(" = ");
            let sql_type = schema
                .column(col)
                .map(|c| c.sql_type.as_str())
                .unwrap_or("text");
            push_cast(&mut builder, value, sql_type);
        }
    }
    builder.push(") AS t");
    Ok(builder)
}
