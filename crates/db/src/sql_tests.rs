//! Statement construction tests (no database required).

use serde_json::json;

use crate::sql::*;
use crate::{ColumnInfo, DbError, Filter, Frame, TableSchema};

fn visits() -> TableSchema {
    TableSchema::new(
        "visits",
        vec![
            ColumnInfo::key("visit_id", "integer"),
            ColumnInfo::new("status", "text"),
            ColumnInfo::new("tags", "text[]"),
        ],
    )
}

fn frame(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> Frame {
    let mut frame = Frame::new(columns.iter().copied()).unwrap();
    for row in rows {
        frame.push_row(row).unwrap();
    }
    frame
}

#[test]
fn identifiers_are_quoted() {
    assert_eq!(quote_ident("visit_id"), "\"visit_id\"");
    assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    assert_eq!(quote_table("public.visits"), "\"public\".\"visits\"");
}

#[test]
fn table_names_keep_their_case() {
    assert_eq!(quote_table("Visits"), "\"Visits\"");
    assert_eq!(quote_table("Ops.Visits"), "\"Ops\".\"Visits\"");
}

#[test]
fn trailing_semicolons_are_stripped() {
    assert_eq!(strip_statement("  SELECT 1 ;;\n"), "SELECT 1");
    assert_eq!(strip_statement("SELECT ';'"), "SELECT ';'");
}

#[test]
fn trailing_line_comment_does_not_hide_the_wrapper() {
    let sql = rows_as_json(strip_statement("SELECT 1 AS n -- one"));
    assert_eq!(sql, "SELECT row_to_json(t)::text FROM (SELECT 1 AS n -- one\n) AS t");
    let last = sql.lines().last().unwrap();
    assert_eq!(last, ") AS t");
}

#[test]
fn cells_render_as_text() {
    assert_eq!(render_cell(&json!(null), "integer"), None);
    assert_eq!(render_cell(&json!(42), "integer").as_deref(), Some("42"));
    assert_eq!(render_cell(&json!("done"), "text").as_deref(), Some("done"));
    assert_eq!(render_cell(&json!(true), "boolean").as_deref(), Some("true"));
    assert_eq!(
        render_cell(&json!({ "k": 1 }), "jsonb").as_deref(),
        Some("{\"k\":1}")
    );
}

#[test]
fn arrays_render_as_postgres_literals_for_array_columns() {
    assert_eq!(
        render_cell(&json!(["a", "b\"c", null]), "text[]").as_deref(),
        Some("{\"a\",\"b\\\"c\",NULL}")
    );
    assert_eq!(
        render_cell(&json!([[1, 2], [3, 4]]), "integer[]").as_deref(),
        Some("{{1,2},{3,4}}")
    );
    assert_eq!(render_cell(&json!([1, 2]), "jsonb").as_deref(), Some("[1,2]"));
}

#[test]
fn insert_casts_each_cell_to_its_column_type() {
    let frame = frame(
        &["visit_id", "status"],
        vec![vec![json!(1), json!("done")], vec![json!(2), json!(null)]],
    );
    let statements = insert_statements(&visits(), &frame).unwrap();

    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql(),
        "INSERT INTO \"visits\" (\"visit_id\", \"status\") VALUES \
         (CAST($1 AS integer), CAST($2 AS text)), (CAST($3 AS integer), CAST($4 AS text))"
    );
}

#[test]
fn casts_use_the_unmodified_column_type() {
    let schema = TableSchema::new(
        "visits",
        vec![
            ColumnInfo::key("visit_id", "integer"),
            ColumnInfo::new("status", "character varying"),
        ],
    );
    let frame = frame(&["visit_id", "status"], vec![vec![json!(1), json!("doneXYZ")]]);
    let statements = insert_statements(&schema, &frame).unwrap();
    assert_eq!(
        statements[0].sql(),
        "INSERT INTO \"visits\" (\"visit_id\", \"status\") VALUES \
         (CAST($1 AS integer), CAST($2 AS character varying))"
    );

    let filter = Filter::new().eq("status", "doneXYZ");
    let statement = select_by_filter(&schema, &filter).unwrap();
    assert!(statement.sql().ends_with("\"status\" = CAST($1 AS character varying)) AS t"));
}

#[test]
fn insert_is_chunked_under_the_bind_limit() {
    let rows = (0..MAX_BIND_PARAMS / 2 + 1)
        .map(|i| vec![json!(i), json!("x")])
        .collect();
    let frame = frame(&["visit_id", "status"], rows);

    let statements = insert_statements(&visits(), &frame).unwrap();
    assert_eq!(statements.len(), 2);
}

#[test]
fn empty_frame_inserts_nothing() {
    let frame = Frame::new(["visit_id"]).unwrap();
    assert!(insert_statements(&visits(), &frame).unwrap().is_empty());
}

#[test]
fn insert_rejects_unknown_columns() {
    let frame = frame(&["visit_id", "colour"], vec![vec![json!(1), json!("red")]]);
    let err = insert_statements(&visits(), &frame).err().unwrap();
    assert!(matches!(err, DbError::SchemaMismatch { ref columns, .. } if columns == &["colour"]));
}

#[test]
fn update_sets_non_key_columns_where_keys_match() {
    let frame = frame(&["status", "visit_id"], vec![vec![json!("done"), json!(42)]]);
    let statements = update_statements(&visits(), &frame).unwrap();

    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql(),
        "UPDATE \"visits\" SET \"status\" = CAST($1 AS text) WHERE \"visit_id\" = CAST($2 AS integer)"
    );
}

#[test]
fn update_without_key_column_fails() {
    let frame = frame(&["status"], vec![vec![json!("done")]]);
    assert!(matches!(
        update_statements(&visits(), &frame),
        Err(DbError::MissingKey { .. })
    ));
}

#[test]
fn update_of_key_columns_only_is_a_no_op() {
    let frame = frame(&["visit_id"], vec![vec![json!(1)]]);
    assert!(update_statements(&visits(), &frame).unwrap().is_empty());
}

#[test]
fn filter_builds_conjunction_with_null_checks() {
    let filter = Filter::new().eq("visit_id", 42).eq("status", serde_json::Value::Null);
    let statement = select_by_filter(&visits(), &filter).unwrap();

    assert_eq!(
        statement.sql(),
        "SELECT row_to_json(t)::text FROM (SELECT * FROM \"visits\" \
         WHERE \"visit_id\" = CAST($1 AS integer) AND \"status\" IS NULL) AS t"
    );
}

#[test]
fn empty_filter_selects_everything() {
    let statement = select_by_filter(&visits(), &Filter::new()).unwrap();
    assert_eq!(
        statement.sql(),
        "SELECT row_to_json(t)::text FROM (SELECT * FROM \"visits\") AS t"
    );
    assert_eq!(statement.sql(), select_all(&visits()));
}

#[test]
fn filter_on_unknown_column_is_a_schema_mismatch() {
    let filter = Filter::new().eq("pfs_visit_id", 1);
    assert!(matches!(
        select_by_filter(&visits(), &filter),
        Err(DbError::SchemaMismatch { .. })
    ));
}
