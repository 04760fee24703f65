//! Column rendering shared by the dialect generators.
//!
//! Each generator assembles its column definitions from these pieces in its
//! own order; what differs between dialects (where REFERENCES goes, how
//! auto-increment is spelled) stays in the generator.

use indexmap::IndexMap;
use relmodel_core::{AttributeDescriptor, DataType, Dialect, Result, Value};

/// Where a column definition is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnContext {
    CreateTable,
    AddColumn,
    ChangeColumn,
}

/// Options of `DROP TABLE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropTableOptions {
    /// Drop dependent objects too (PostgreSQL)
    pub cascade: bool,
}

impl DropTableOptions {
    pub fn cascade() -> Self {
        Self { cascade: true }
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// `DROP TABLE IF EXISTS`, with `CASCADE` where the dialect has it.
pub(crate) fn drop_table(dialect: Dialect, table: &str, options: DropTableOptions) -> String {
    let mut sql = format!("DROP TABLE IF EXISTS {}", dialect.quote_identifiers(table));
    if options.cascade {
        if dialect == Dialect::Postgres {
            sql.push_str(" CASCADE");
        } else {
            tracing::warn!(dialect = %dialect, table = %table, "DROP TABLE CASCADE ignored");
        }
    }
    sql.push(';');
    sql
}

/// `ALTER TABLE t RENAME COLUMN a TO b;`
pub(crate) fn rename_column(dialect: Dialect, table: &str, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {};",
        dialect.quote_identifiers(table),
        dialect.quote_identifier(from),
        dialect.quote_identifier(to)
    )
}

/// Column type with the dialect's spelling.
pub(crate) fn column_type(dialect: Dialect, attr: &AttributeDescriptor) -> Result<String> {
    attr.data_type.to_sql(dialect)
}

/// ` DEFAULT <literal>`, or nothing when the column has no default.
///
/// MySQL refuses defaults on BLOB, TEXT and JSON columns, so they are left
/// out there.
pub(crate) fn default_clause(dialect: Dialect, attr: &AttributeDescriptor) -> Option<String> {
    let value = attr.default_value.as_ref()?;
    if matches!(value, Value::Null) && attr.allow_null {
        return None;
    }
    if dialect == Dialect::Mysql
        && matches!(attr.data_type, DataType::Blob | DataType::Text | DataType::Json)
    {
        tracing::trace!(column = %attr.field, "MySQL column type takes no DEFAULT");
        return None;
    }
    Some(format!(" DEFAULT {}", dialect.escape(value)))
}

/// `REFERENCES t (k) ON DELETE .. ON UPDATE ..`, or `None` without a reference.
pub(crate) fn references_clause(dialect: Dialect, attr: &AttributeDescriptor) -> Option<String> {
    let references = attr.references.as_ref()?;
    let key = references.key.as_deref().unwrap_or("id");
    let mut sql = format!(
        "REFERENCES {} ({})",
        dialect.quote_identifiers(&references.table),
        dialect.quote_identifier(key)
    );
    if let Some(action) = attr.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action.as_sql());
    }
    if let Some(action) = attr.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action.as_sql());
    }
    Some(sql)
}

/// Quoted, comma separated column list.
pub(crate) fn quote_list<'a>(dialect: Dialect, columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Columns of the primary key, in declaration order.
pub(crate) fn primary_key_columns<'a>(
    attributes: impl IntoIterator<Item = &'a AttributeDescriptor>,
) -> Vec<&'a str> {
    attributes
        .into_iter()
        .filter(|a| a.primary_key)
        .map(|a| a.field.as_str())
        .collect()
}

/// Composite unique keys by name, members in declaration order.
pub(crate) fn named_unique_keys<'a>(
    attributes: impl IntoIterator<Item = &'a AttributeDescriptor>,
) -> IndexMap<&'a str, Vec<&'a str>> {
    let mut keys: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for attr in attributes {
        if let Some(name) = attr.unique_key_name() {
            keys.entry(name).or_default().push(attr.field.as_str());
        }
    }
    keys
}

/// The part of a schema-qualified table name after the last dot.
pub(crate) fn bare_table_name(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmodel_core::ReferentialAction;

    // ==================== Default Tests ====================

    #[test]
    fn test_default_clause_escapes_per_dialect() {
        let attr = AttributeDescriptor::new("name", DataType::String(255)).default_value("it's");
        assert_eq!(
            default_clause(Dialect::Mysql, &attr).as_deref(),
            Some(" DEFAULT 'it\\'s'")
        );
        assert_eq!(
            default_clause(Dialect::Postgres, &attr).as_deref(),
            Some(" DEFAULT 'it''s'")
        );
    }

    #[test]
    fn test_default_clause_skips_mysql_text() {
        let attr = AttributeDescriptor::new("body", DataType::Text).default_value("x");
        assert_eq!(default_clause(Dialect::Mysql, &attr), None);
        assert_eq!(
            default_clause(Dialect::Sqlite, &attr).as_deref(),
            Some(" DEFAULT 'x'")
        );
    }

    #[test]
    fn test_default_clause_raw_function() {
        let attr = AttributeDescriptor::new("createdAt", DataType::Date)
            .default_value(Value::raw("CURRENT_TIMESTAMP"));
        assert_eq!(
            default_clause(Dialect::Postgres, &attr).as_deref(),
            Some(" DEFAULT CURRENT_TIMESTAMP")
        );
    }

    // ==================== Reference Tests ====================

    #[test]
    fn test_references_clause() {
        let attr = AttributeDescriptor::new("otherId", DataType::Integer)
            .references("otherTable", "id")
            .on_delete(ReferentialAction::Cascade)
            .on_update(ReferentialAction::NoAction);
        assert_eq!(
            references_clause(Dialect::Mysql, &attr).as_deref(),
            Some("REFERENCES `otherTable` (`id`) ON DELETE CASCADE ON UPDATE NO ACTION")
        );
        assert_eq!(
            references_clause(Dialect::Postgres, &attr).as_deref(),
            Some("REFERENCES \"otherTable\" (\"id\") ON DELETE CASCADE ON UPDATE NO ACTION")
        );
    }

    #[test]
    fn test_references_default_key_and_schema() {
        let mut attr = AttributeDescriptor::new("otherId", DataType::Integer);
        attr.references = Some(relmodel_core::References {
            table: "app.others".into(),
            key: None,
        });
        assert_eq!(
            references_clause(Dialect::Postgres, &attr).as_deref(),
            Some("REFERENCES \"app\".\"others\" (\"id\")")
        );
    }

    // ==================== Key Tests ====================

    #[test]
    fn test_named_unique_keys_group_members() {
        let attrs = [
            AttributeDescriptor::new("a", DataType::Integer).unique_key("ab"),
            AttributeDescriptor::new("c", DataType::Integer).unique(),
            AttributeDescriptor::new("b", DataType::Integer).unique_key("ab"),
        ];
        let keys = named_unique_keys(&attrs);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys["ab"], vec!["a", "b"]);
    }

    #[test]
    fn test_bare_table_name() {
        assert_eq!(bare_table_name("app.users"), "users");
        assert_eq!(bare_table_name("users"), "users");
    }

    #[test]
    fn test_drop_table_cascade_only_on_postgres() {
        assert_eq!(
            drop_table(Dialect::Postgres, "users", DropTableOptions::cascade()),
            "DROP TABLE IF EXISTS \"users\" CASCADE;"
        );
        assert_eq!(
            drop_table(Dialect::Mysql, "users", DropTableOptions::cascade()),
            "DROP TABLE IF EXISTS `users`;"
        );
    }
}
