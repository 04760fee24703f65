//! Per-dialect query generators.
//!
//! [`QueryGenerator`] is the single interface over every statement relmodel
//! produces. DML and SELECT are shared and delegate to `relmodel-query`; DDL
//! is dialect-specific. An operation a dialect does not define fails with
//! `UnsupportedOperation` instead of producing something approximate.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlQueryGenerator;
pub use postgres::PostgresQueryGenerator;
pub use sqlite::SqliteQueryGenerator;

use crate::ddl::{self, DropTableOptions};
use crate::index::{self, IndexTarget};
use relmodel_core::{
    AssociationGraph, AttributeDescriptor, Dialect, Error, GeneratorOptions, IndexDefinition,
    ModelDefinition, ModelId, Result, Row,
};
use relmodel_query::{
    DeleteOptions, FindOptions, FindQuery, InsertOptions, Predicate, TruncateOptions,
    UpdateOptions,
};

/// Generates SQL statements for one dialect.
pub trait QueryGenerator: Send + Sync {
    /// Generator configuration, including the dialect.
    fn options(&self) -> &GeneratorOptions;

    /// The database dialect.
    fn dialect(&self) -> Dialect {
        self.options().dialect
    }

    // ==================== Tables ====================

    /// `CREATE TABLE IF NOT EXISTS` for a model.
    fn create_table(&self, _model: &ModelDefinition) -> Result<String> {
        Err(self.unsupported("createTable"))
    }

    fn drop_table(&self, table: &str, options: DropTableOptions) -> Result<String> {
        tracing::debug!(dialect = %self.dialect(), table = %table, "Generating DROP TABLE");
        Ok(ddl::drop_table(self.dialect(), table, options))
    }

    fn rename_table(&self, from: &str, to: &str) -> Result<String> {
        tracing::debug!(dialect = %self.dialect(), from = %from, to = %to, "Generating table rename");
        let dialect = self.dialect();
        Ok(format!(
            "ALTER TABLE {} RENAME TO {};",
            dialect.quote_identifiers(from),
            dialect.quote_identifiers(to)
        ))
    }

    /// Empty a table.
    fn truncate_table(&self, table: &str, options: TruncateOptions) -> Result<String> {
        Ok(relmodel_query::truncate_query(self.dialect(), table, options))
    }

    // ==================== Columns ====================

    fn add_column(&self, _table: &str, _attribute: &AttributeDescriptor) -> Result<String> {
        Err(self.unsupported("addColumn"))
    }

    fn remove_column(&self, table: &str, column: &str) -> Result<String> {
        let dialect = self.dialect();
        tracing::debug!(dialect = %dialect, table = %table, column = %column, "Generating DROP COLUMN");
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            dialect.quote_identifiers(table),
            dialect.quote_identifier(column)
        ))
    }

    /// Redefine an existing column to match `attribute`.
    fn change_column(&self, _table: &str, _attribute: &AttributeDescriptor) -> Result<String> {
        Err(self.unsupported("changeColumn"))
    }

    fn rename_column(&self, table: &str, from: &str, to: &str) -> Result<String> {
        tracing::debug!(dialect = %self.dialect(), table = %table, from = %from, to = %to, "Generating column rename");
        Ok(ddl::rename_column(self.dialect(), table, from, to))
    }

    // ==================== Queries ====================

    /// SELECT against a bare table.
    fn select(&self, table: &str, options: &FindOptions) -> Result<String> {
        tracing::debug!(dialect = %self.dialect(), table = %table, "Generating SELECT");
        relmodel_query::select_query(self.dialect(), table, options)
    }

    /// SELECT against a model, planning its includes.
    fn find(
        &self,
        graph: &AssociationGraph,
        model: ModelId,
        options: &FindOptions,
    ) -> Result<FindQuery> {
        relmodel_query::find_query(graph, model, options, self.options())
    }

    fn insert(&self, table: &str, row: &Row, options: &InsertOptions) -> Result<String> {
        relmodel_query::insert_query(self.dialect(), table, row, self.options().omit_null, options)
    }

    fn bulk_insert(&self, table: &str, rows: &[Row], options: &InsertOptions) -> Result<String> {
        relmodel_query::bulk_insert_query(self.dialect(), table, rows, options)
    }

    fn update(
        &self,
        table: &str,
        values: &Row,
        where_clause: &Predicate,
        options: &UpdateOptions,
    ) -> Result<String> {
        relmodel_query::update_query(
            self.dialect(),
            table,
            values,
            where_clause,
            self.options().omit_null,
            options,
        )
    }

    fn delete(&self, table: &str, where_clause: &Predicate, options: &DeleteOptions) -> Result<String> {
        relmodel_query::delete_query(self.dialect(), table, where_clause, options)
    }

    /// DELETE of every matching row, or TRUNCATE when `options.truncate` is set.
    fn bulk_delete(
        &self,
        table: &str,
        where_clause: &Predicate,
        options: &DeleteOptions,
    ) -> Result<String> {
        tracing::debug!(dialect = %self.dialect(), table = %table, truncate = options.truncate, "Generating bulk DELETE");
        relmodel_query::delete_query(self.dialect(), table, where_clause, options)
    }

    // ==================== Indexes and Constraints ====================

    fn add_index(&self, table: &str, index: &IndexDefinition) -> Result<String> {
        index::add_index_query(self.dialect(), table, index)
    }

    fn remove_index(&self, table: &str, target: &IndexTarget) -> Result<String> {
        Ok(index::remove_index_query(self.dialect(), table, target))
    }

    fn show_indexes(&self, table: &str) -> Result<String> {
        Ok(index::show_indexes_query(self.dialect(), table))
    }

    /// Statement listing the constraints of a table, optionally one by name.
    fn show_constraints(&self, _table: &str, _constraint: Option<&str>) -> Result<String> {
        Err(self.unsupported("showConstraints"))
    }

    /// Statement re-enabling foreign key checks; `None` when the dialect has
    /// no session-level switch.
    fn enable_foreign_key_constraints(&self) -> Option<String> {
        None
    }

    fn disable_foreign_key_constraints(&self) -> Option<String> {
        None
    }

    /// Error for an operation this dialect does not define.
    fn unsupported(&self, operation: &str) -> Error {
        tracing::debug!(dialect = %self.dialect(), operation = %operation, "Operation not defined for dialect");
        Error::unsupported(operation, self.dialect().name())
    }
}

/// Create a query generator for the given dialect.
///
/// `options.dialect` is overwritten with `dialect`.
pub fn generator_for_dialect(dialect: Dialect, options: GeneratorOptions) -> Box<dyn QueryGenerator> {
    let options = GeneratorOptions { dialect, ..options };
    match dialect {
        Dialect::Mysql => Box::new(MysqlQueryGenerator::new(options)),
        Dialect::Postgres => Box::new(PostgresQueryGenerator::new(options)),
        Dialect::Sqlite => Box::new(SqliteQueryGenerator::new(options)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Factory Tests ====================

    #[test]
    fn test_generator_for_dialect() {
        for dialect in [Dialect::Mysql, Dialect::Postgres, Dialect::Sqlite] {
            let generator = generator_for_dialect(dialect, GeneratorOptions::default());
            assert_eq!(generator.dialect(), dialect);
        }
    }

    #[test]
    fn test_generator_keeps_options() {
        let generator = generator_for_dialect(
            Dialect::Mysql,
            GeneratorOptions::default().omit_null(true).charset("utf8mb4"),
        );
        assert!(generator.options().omit_null);
        assert_eq!(generator.options().charset.as_deref(), Some("utf8mb4"));
    }

    // ==================== Shared DDL Tests ====================

    #[test]
    fn test_rename_table() {
        let pg = generator_for_dialect(Dialect::Postgres, GeneratorOptions::default());
        assert_eq!(
            pg.rename_table("users", "people").unwrap(),
            "ALTER TABLE \"users\" RENAME TO \"people\";"
        );
        let mysql = generator_for_dialect(Dialect::Mysql, GeneratorOptions::default());
        assert_eq!(
            mysql.rename_table("users", "people").unwrap(),
            "RENAME TABLE `users` TO `people`;"
        );
    }

    #[test]
    fn test_rename_column() {
        let sqlite = generator_for_dialect(Dialect::Sqlite, GeneratorOptions::default());
        assert_eq!(
            sqlite.rename_column("users", "name", "fullName").unwrap(),
            "ALTER TABLE `users` RENAME COLUMN `name` TO `fullName`;"
        );
    }

    #[test]
    fn test_foreign_key_switches() {
        let mysql = generator_for_dialect(Dialect::Mysql, GeneratorOptions::default());
        assert_eq!(
            mysql.disable_foreign_key_constraints().as_deref(),
            Some("SET FOREIGN_KEY_CHECKS=0;")
        );
        assert_eq!(
            mysql.enable_foreign_key_constraints().as_deref(),
            Some("SET FOREIGN_KEY_CHECKS=1;")
        );
        let sqlite = generator_for_dialect(Dialect::Sqlite, GeneratorOptions::default());
        assert_eq!(
            sqlite.enable_foreign_key_constraints().as_deref(),
            Some("PRAGMA foreign_keys = ON;")
        );
        let pg = generator_for_dialect(Dialect::Postgres, GeneratorOptions::default());
        assert_eq!(pg.enable_foreign_key_constraints(), None);
        assert_eq!(pg.disable_foreign_key_constraints(), None);
    }

    #[test]
    fn test_insert_honors_omit_null_option() {
        let row = Row::new().with("name", "a").with("bio", relmodel_core::Value::Null);
        let plain = generator_for_dialect(Dialect::Postgres, GeneratorOptions::default());
        assert_eq!(
            plain.insert("users", &row, &InsertOptions::default()).unwrap(),
            "INSERT INTO \"users\" (\"name\",\"bio\") VALUES ('a',NULL);"
        );
        let omitting =
            generator_for_dialect(Dialect::Postgres, GeneratorOptions::default().omit_null(true));
        assert_eq!(
            omitting.insert("users", &row, &InsertOptions::default()).unwrap(),
            "INSERT INTO \"users\" (\"name\") VALUES ('a');"
        );
    }

    #[test]
    fn test_unsupported_error_names_dialect() {
        let sqlite = generator_for_dialect(Dialect::Sqlite, GeneratorOptions::default());
        let err = sqlite.show_constraints("users", None).unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("sqlite"));
    }

    struct BareGenerator(GeneratorOptions);

    impl QueryGenerator for BareGenerator {
        fn options(&self) -> &GeneratorOptions {
            &self.0
        }
    }

    #[test]
    fn test_default_ddl_methods_are_unsupported() {
        let bare = BareGenerator(GeneratorOptions::new(Dialect::Postgres));
        let attr = AttributeDescriptor::new("bio", relmodel_core::DataType::Text);
        assert!(bare.create_table(&ModelDefinition::new("User")).unwrap_err().is_unsupported());
        assert!(bare.add_column("users", &attr).unwrap_err().is_unsupported());
        assert!(bare.change_column("users", &attr).unwrap_err().is_unsupported());
        assert!(bare.show_constraints("users", Some("pk")).unwrap_err().is_unsupported());
        assert_eq!(
            bare.rename_column("users", "bio", "about").unwrap(),
            "ALTER TABLE \"users\" RENAME COLUMN \"bio\" TO \"about\";"
        );
    }
}
