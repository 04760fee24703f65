//! SQLite query generator.
//!
//! SQLite cannot alter a column in place and has no constraint catalog, so
//! `change_column` and `show_constraints` are not defined here.

use super::QueryGenerator;
use crate::ddl::{self, ColumnContext};
use relmodel_core::{AttributeDescriptor, Dialect, GeneratorOptions, ModelDefinition, Result, UniqueKey};
use relmodel_query::join::table_ref;

const DIALECT: Dialect = Dialect::Sqlite;

/// Query generator for SQLite.
#[derive(Debug, Clone)]
pub struct SqliteQueryGenerator {
    options: GeneratorOptions,
}

impl SqliteQueryGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options: GeneratorOptions {
                dialect: DIALECT,
                ..options
            },
        }
    }

    /// Column definition. A lone integer primary key is the rowid alias
    /// `INTEGER PRIMARY KEY`; members of a composite key are only `NOT NULL`.
    fn column_definition(
        &self,
        attr: &AttributeDescriptor,
        context: ColumnContext,
        composite_key: bool,
    ) -> Result<String> {
        let inline_key = attr.primary_key && !composite_key;
        let mut sql = if inline_key && attr.data_type.is_integer() {
            let mut sql = "INTEGER PRIMARY KEY".to_string();
            if attr.auto_increment {
                sql.push_str(" AUTOINCREMENT");
            }
            sql
        } else {
            let mut sql = ddl::column_type(DIALECT, attr)?;
            if !attr.allow_null {
                sql.push_str(" NOT NULL");
            }
            if let Some(default) = ddl::default_clause(DIALECT, attr) {
                sql.push_str(&default);
            }
            if attr.unique == Some(UniqueKey::Unnamed) {
                sql.push_str(" UNIQUE");
            }
            if inline_key {
                sql.push_str(" PRIMARY KEY");
            }
            sql
        };
        if let Some(references) = ddl::references_clause(DIALECT, attr) {
            sql.push(' ');
            sql.push_str(&references);
        }
        if attr.comment.is_some() {
            tracing::trace!(column = %attr.field, context = ?context, "SQLite column comment dropped");
        }
        Ok(sql)
    }
}

impl Default for SqliteQueryGenerator {
    fn default() -> Self {
        Self::new(GeneratorOptions::new(DIALECT))
    }
}

impl QueryGenerator for SqliteQueryGenerator {
    fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    fn create_table(&self, model: &ModelDefinition) -> Result<String> {
        let table = table_ref(model);
        tracing::debug!(
            dialect = %DIALECT,
            table = %table,
            columns = model.attributes.len(),
            "Generating CREATE TABLE"
        );

        let attributes: Vec<&AttributeDescriptor> = model.attributes.values().collect();
        let primary_key = ddl::primary_key_columns(attributes.iter().copied());
        let composite_key = primary_key.len() > 1;

        let mut clauses = Vec::with_capacity(attributes.len() + 1);
        for attr in &attributes {
            let definition = self.column_definition(attr, ColumnContext::CreateTable, composite_key)?;
            clauses.push(format!("{} {definition}", DIALECT.quote_identifier(&attr.field)));
        }
        for columns in ddl::named_unique_keys(attributes.iter().copied()).into_values() {
            clauses.push(format!("UNIQUE ({})", ddl::quote_list(DIALECT, columns)));
        }
        if composite_key {
            clauses.push(format!("PRIMARY KEY ({})", ddl::quote_list(DIALECT, primary_key)));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            DIALECT.quote_identifiers(&table),
            clauses.join(", ")
        );
        tracing::trace!(sql = %sql, "Generated CREATE TABLE");
        Ok(sql)
    }

    fn add_column(&self, table: &str, attribute: &AttributeDescriptor) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, table = %table, column = %attribute.field, "Generating ADD COLUMN");
        Ok(format!(
            "ALTER TABLE {} ADD {} {};",
            DIALECT.quote_identifiers(table),
            DIALECT.quote_identifier(&attribute.field),
            self.column_definition(attribute, ColumnContext::AddColumn, false)?
        ))
    }

    fn enable_foreign_key_constraints(&self) -> Option<String> {
        Some("PRAGMA foreign_keys = ON;".to_string())
    }

    fn disable_foreign_key_constraints(&self) -> Option<String> {
        Some("PRAGMA foreign_keys = OFF;".to_string())
    }
}
