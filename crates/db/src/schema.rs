//! Table shape as reported by the PostgreSQL catalog.

use crate::DbError;

/// Columns of a table in catalog order, with their SQL types and whether they
/// belong to the primary key.
///
/// Types are printed without their modifier (`character varying`, not
/// `character varying(4)`): an explicit cast to a length-limited type
/// truncates silently, while assignment to the column raises an error.
pub(crate) const TABLE_SCHEMA_SQL: &str = r#"
    SELECT a.attname::text,
           format_type(a.atttypid, NULL),
           COALESCE(a.attnum = ANY(i.indkey), false)
    FROM pg_attribute a
    LEFT JOIN pg_index i ON i.indrelid = a.attrelid AND i.indisprimary
    WHERE a.attrelid = CAST($1 AS regclass)
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Base type as printed by `format_type`, e.g. `integer` or `character varying`.
    pub sql_type: String,
    pub is_key: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self { name: name.into(), sql_type: sql_type.into(), is_key: false }
    }

    pub fn key(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self { is_key: true, ..Self::new(name, sql_type) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self { table: table.into(), columns }
    }

    pub fn from_rows(table: &str, rows: Vec<(String, String, bool)>) -> Self {
        let columns = rows
            .into_iter()
            .map(|(name, sql_type, is_key)| ColumnInfo { name, sql_type, is_key })
            .collect();
        Self::new(table, columns)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn key_columns(&self) -> Vec<&ColumnInfo> {
        self.columns.iter().filter(|c| c.is_key).collect()
    }

    /// Fail with [`DbError::SchemaMismatch`] naming every column the table lacks.
    pub fn check_columns<'a, I>(&self, columns: I) -> Result<(), DbError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unknown: Vec<String> = columns
            .into_iter()
            .filter(|c| self.column(c).is_none())
            .map(str::to_owned)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(DbError::SchemaMismatch { table: self.table.clone(), columns: unknown })
        }
    }

    /// Key columns an update needs, all of which must be present in `columns`.
    pub fn require_keys(&self, columns: &[String]) -> Result<Vec<&ColumnInfo>, DbError> {
        let keys = self.key_columns();
        if keys.is_empty() || keys.iter().any(|k| !columns.contains(&k.name)) {
            return Err(DbError::MissingKey { table: self.table.clone() });
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visits() -> TableSchema {
        TableSchema::new(
            "visits",
            vec![ColumnInfo::key("visit_id", "integer"), ColumnInfo::new("status", "text")],
        )
    }

    #[test]
    fn unknown_columns_are_all_reported() {
        let err = visits()
            .check_columns(["visit_id", "colour", "size"])
            .unwrap_err();
        match err {
            DbError::SchemaMismatch { table, columns } => {
                assert_eq!(table, "visits");
                assert_eq!(columns, ["colour", "size"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn keys_must_be_present_for_update() {
        let schema = visits();
        assert!(schema.require_keys(&["status".into()]).is_err());
        let keys = schema.require_keys(&["visit_id".into(), "status".into()]).unwrap();
        assert_eq!(keys[0].name, "visit_id");
    }

    #[test]
    fn catalog_types_are_read_without_length_modifiers() {
        assert!(TABLE_SCHEMA_SQL.contains("format_type(a.atttypid, NULL)"));
        assert!(!TABLE_SCHEMA_SQL.contains("atttypmod"));
    }

    #[test]
    fn table_without_primary_key_cannot_be_updated() {
        let schema = TableSchema::new("log", vec![ColumnInfo::new("line", "text")]);
        assert!(matches!(
            schema.require_keys(&["line".into()]),
            Err(DbError::MissingKey { .. })
        ));
    }
}
