//! Secondary index statements.

use heck::ToSnakeCase;
use relmodel_core::{Dialect, Error, GenerationErrorKind, IndexDefinition, IndexType, Result};

/// Index addressed by `remove_index`: an explicit name, or the fields the
/// name is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    Name(String),
    Fields(Vec<String>),
}

impl From<&str> for IndexTarget {
    fn from(name: &str) -> Self {
        IndexTarget::Name(name.to_string())
    }
}

impl From<String> for IndexTarget {
    fn from(name: String) -> Self {
        IndexTarget::Name(name)
    }
}

impl From<Vec<String>> for IndexTarget {
    fn from(fields: Vec<String>) -> Self {
        IndexTarget::Fields(fields)
    }
}

impl From<&[&str]> for IndexTarget {
    fn from(fields: &[&str]) -> Self {
        IndexTarget::Fields(fields.iter().map(|f| (*f).to_string()).collect())
    }
}

/// Default index name: `<table>_<field>_<field>` in snake case, with schema
/// dots turned into underscores.
///
/// `index_name("User", ["username", "isAdmin"])` is `user_username_is_admin`.
pub fn index_name<'a>(table: &str, fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut name = table.replace('.', "_");
    for field in fields {
        name.push('_');
        name.push_str(field);
    }
    name.to_snake_case()
}

/// `CREATE [UNIQUE|FULLTEXT|SPATIAL] INDEX`.
///
/// What each dialect accepts:
///
/// | | MySQL | PostgreSQL | SQLite |
/// |---|---|---|---|
/// | index type | yes | UNIQUE only | UNIQUE only |
/// | `USING` | before `ON` | after `ON` | dropped |
/// | field length | yes | no | no |
/// | field collate | no | yes | yes |
/// | `WITH PARSER` | yes | no | no |
/// | `CONCURRENTLY` | no | yes | no |
/// | partial `WHERE` | no | yes | yes |
pub fn add_index_query(dialect: Dialect, table: &str, index: &IndexDefinition) -> Result<String> {
    tracing::debug!(
        dialect = %dialect,
        table = %table,
        fields = index.fields.len(),
        "Generating CREATE INDEX"
    );

    if index.fields.is_empty() {
        return Err(Error::generation(
            GenerationErrorKind::InvalidIndex,
            format!("index on \"{table}\" has no fields"),
        ));
    }

    let mut columns = Vec::with_capacity(index.fields.len());
    let mut fields = Vec::with_capacity(index.fields.len());
    for field in &index.fields {
        let Some(column) = field.column() else {
            return Err(Error::generation(
                GenerationErrorKind::InvalidIndex,
                format!("an index field on \"{table}\" has no name"),
            ));
        };
        columns.push(column);

        let mut sql = dialect.quote_identifier(column);
        if let Some(collate) = &field.collate {
            if dialect == Dialect::Mysql {
                tracing::warn!(dialect = %dialect, column = %column, "index field COLLATE ignored");
            } else {
                sql.push_str(" COLLATE ");
                sql.push_str(&dialect.quote_identifier(collate));
            }
        }
        if let Some(length) = field.length {
            if dialect == Dialect::Mysql && length > 0 {
                sql.push_str(&format!("({length})"));
            }
        }
        if let Some(order) = field.order {
            sql.push(' ');
            sql.push_str(order.as_sql());
        }
        fields.push(sql);
    }

    let name = match &index.name {
        Some(name) => name.clone(),
        None => index_name(table, columns.iter().copied()),
    };

    let kind = match index.index_type {
        Some(IndexType::Unique) => Some("UNIQUE"),
        Some(other) if dialect == Dialect::Mysql => Some(other.as_sql()),
        Some(other) => {
            tracing::warn!(dialect = %dialect, index = %name, kind = other.as_sql(), "index type ignored");
            None
        }
        None => None,
    };

    let mut parts: Vec<String> = vec!["CREATE".to_string()];
    parts.extend(kind.map(str::to_string));
    parts.push("INDEX".to_string());
    if index.concurrently && dialect == Dialect::Postgres {
        parts.push("CONCURRENTLY".to_string());
    }
    parts.push(dialect.quote_identifiers(&name));
    match (&index.using, dialect) {
        (Some(method), Dialect::Mysql) => {
            parts.push(format!("USING {method}"));
            parts.push(format!("ON {}", dialect.quote_identifiers(table)));
        }
        (Some(method), Dialect::Postgres) => {
            parts.push(format!("ON {}", dialect.quote_identifiers(table)));
            parts.push(format!("USING {method}"));
        }
        _ => parts.push(format!("ON {}", dialect.quote_identifiers(table))),
    }
    parts.push(format!("({})", fields.join(", ")));
    if let Some(parser) = &index.parser {
        if dialect == Dialect::Mysql {
            parts.push(format!("WITH PARSER {parser}"));
        }
    }
    if let Some(predicate) = &index.where_clause {
        if dialect == Dialect::Mysql {
            tracing::warn!(dialect = %dialect, index = %name, "partial index WHERE ignored");
        } else {
            parts.push(format!("WHERE {predicate}"));
        }
    }

    let sql = parts.join(" ");
    tracing::trace!(sql = %sql, "Generated CREATE INDEX");
    Ok(sql)
}

/// `DROP INDEX`, by name or by the fields the default name derives from.
pub fn remove_index_query(dialect: Dialect, table: &str, target: &IndexTarget) -> String {
    let name = match target {
        IndexTarget::Name(name) => name.clone(),
        IndexTarget::Fields(fields) => index_name(table, fields.iter().map(String::as_str)),
    };
    tracing::debug!(dialect = %dialect, table = %table, index = %name, "Generating DROP INDEX");

    match dialect {
        Dialect::Mysql => format!(
            "DROP INDEX {} ON {}",
            dialect.quote_identifier(&name),
            dialect.quote_identifiers(table)
        ),
        Dialect::Postgres | Dialect::Sqlite => {
            format!("DROP INDEX IF EXISTS {}", dialect.quote_identifier(&name))
        }
    }
}

/// Statement listing the indexes of a table.
pub fn show_indexes_query(dialect: Dialect, table: &str) -> String {
    match dialect {
        Dialect::Mysql => format!("SHOW INDEX FROM {}", dialect.quote_identifiers(table)),
        Dialect::Sqlite => format!("PRAGMA INDEX_LIST({})", dialect.quote_identifiers(table)),
        Dialect::Postgres => {
            let (schema, bare) = match table.rsplit_once('.') {
                Some((schema, bare)) => (schema, bare),
                None => ("public", table),
            };
            format!(
                "SELECT i.relname AS name, ix.indisprimary AS primary, ix.indisunique AS unique, \
                 ix.indkey AS indkey, array_agg(a.attnum) as column_indexes, \
                 array_agg(a.attname) AS column_names, pg_get_indexdef(ix.indexrelid) AS definition \
                 FROM pg_class t, pg_class i, pg_index ix, pg_attribute a, pg_namespace s \
                 WHERE t.oid = ix.indrelid AND i.oid = ix.indexrelid AND a.attrelid = t.oid \
                 AND t.relkind = 'r' AND t.relname = {} AND s.oid = t.relnamespace AND s.nspname = {} \
                 GROUP BY i.relname, ix.indexrelid, ix.indisprimary, ix.indisunique, ix.indkey \
                 ORDER BY i.relname;",
                dialect.escape_string(bare),
                dialect.escape_string(schema)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmodel_core::{IndexField, SortOrder};

    // ==================== Naming Tests ====================

    #[test]
    fn test_index_name_snake_cases() {
        assert_eq!(index_name("User", ["username", "isAdmin"]), "user_username_is_admin");
        assert_eq!(index_name("app.Users", ["email"]), "app_users_email");
    }

    // ==================== Add Index Tests ====================

    #[test]
    fn test_add_index_default_name_all_dialects() {
        let index = IndexDefinition::new(["username", "isAdmin"]);
        assert_eq!(
            add_index_query(Dialect::Mysql, "User", &index).unwrap(),
            "CREATE INDEX `user_username_is_admin` ON `User` (`username`, `isAdmin`)"
        );
        assert_eq!(
            add_index_query(Dialect::Postgres, "User", &index).unwrap(),
            "CREATE INDEX \"user_username_is_admin\" ON \"User\" (\"username\", \"isAdmin\")"
        );
        assert_eq!(
            add_index_query(Dialect::Sqlite, "User", &index).unwrap(),
            "CREATE INDEX `user_username_is_admin` ON `User` (`username`, `isAdmin`)"
        );
    }

    #[test]
    fn test_add_unique_index_with_name() {
        let index = IndexDefinition::new(["email"]).name("users_email_unique").unique();
        assert_eq!(
            add_index_query(Dialect::Postgres, "users", &index).unwrap(),
            "CREATE UNIQUE INDEX \"users_email_unique\" ON \"users\" (\"email\")"
        );
    }

    #[test]
    fn test_add_index_mysql_options() {
        let index = IndexDefinition::new([IndexField::new("title").length(10).order(SortOrder::Desc)])
            .index_type(IndexType::Fulltext)
            .using("BTREE")
            .parser("ngram");
        assert_eq!(
            add_index_query(Dialect::Mysql, "posts", &index).unwrap(),
            "CREATE FULLTEXT INDEX `posts_title` USING BTREE ON `posts` (`title`(10) DESC) WITH PARSER ngram"
        );
    }

    #[test]
    fn test_add_index_postgres_options() {
        let index = IndexDefinition::new([IndexField::new("name").collate("C")])
            .using("gin")
            .concurrently()
            .where_clause("\"deletedAt\" IS NULL");
        assert_eq!(
            add_index_query(Dialect::Postgres, "users", &index).unwrap(),
            "CREATE INDEX CONCURRENTLY \"users_name\" ON \"users\" USING gin (\"name\" COLLATE \"C\") WHERE \"deletedAt\" IS NULL"
        );
    }

    #[test]
    fn test_add_index_sqlite_drops_mysql_only_options() {
        let index = IndexDefinition::new([IndexField::new("title").length(10)])
            .index_type(IndexType::Fulltext)
            .using("BTREE");
        assert_eq!(
            add_index_query(Dialect::Sqlite, "posts", &index).unwrap(),
            "CREATE INDEX `posts_title` ON `posts` (`title`)"
        );
    }

    #[test]
    fn test_add_index_field_without_name() {
        let index = IndexDefinition {
            fields: vec![IndexField::default()],
            ..IndexDefinition::default()
        };
        let err = add_index_query(Dialect::Mysql, "users", &index).unwrap_err();
        assert_eq!(err.generation_kind(), Some(GenerationErrorKind::InvalidIndex));
    }

    #[test]
    fn test_add_index_attribute_alias() {
        let index = IndexDefinition {
            fields: vec![IndexField {
                attribute: Some("email".into()),
                ..IndexField::default()
            }],
            ..IndexDefinition::default()
        };
        assert_eq!(
            add_index_query(Dialect::Sqlite, "users", &index).unwrap(),
            "CREATE INDEX `users_email` ON `users` (`email`)"
        );
    }

    // ==================== Remove/Show Tests ====================

    #[test]
    fn test_remove_index() {
        assert_eq!(
            remove_index_query(Dialect::Mysql, "users", &"users_email".into()),
            "DROP INDEX `users_email` ON `users`"
        );
        assert_eq!(
            remove_index_query(Dialect::Postgres, "users", &"users_email".into()),
            "DROP INDEX IF EXISTS \"users_email\""
        );
    }

    #[test]
    fn test_remove_index_by_fields_derives_name() {
        let target = IndexTarget::from(&["username", "isAdmin"][..]);
        assert_eq!(
            remove_index_query(Dialect::Sqlite, "User", &target),
            "DROP INDEX IF EXISTS `user_username_is_admin`"
        );
    }

    #[test]
    fn test_show_indexes() {
        assert_eq!(show_indexes_query(Dialect::Mysql, "users"), "SHOW INDEX FROM `users`");
        assert_eq!(show_indexes_query(Dialect::Sqlite, "users"), "PRAGMA INDEX_LIST(`users`)");
        let pg = show_indexes_query(Dialect::Postgres, "app.users");
        assert!(pg.contains("t.relname = 'users'"));
        assert!(pg.contains("s.nspname = 'app'"));
    }
}
