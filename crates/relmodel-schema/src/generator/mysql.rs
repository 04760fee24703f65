//! MySQL query generator.
//!
//! MySQL has no inline `REFERENCES` in column definitions; foreign keys are
//! moved to table-level `FOREIGN KEY` clauses, and table options (engine,
//! charset, collation, row format) follow the column list.

use super::QueryGenerator;
use crate::ddl::{self, ColumnContext};
use relmodel_core::{
    AttributeDescriptor, Dialect, GeneratorOptions, ModelDefinition, Result, UniqueKey,
};
use relmodel_query::join::table_ref;

const DIALECT: Dialect = Dialect::Mysql;

/// Query generator for MySQL and MariaDB.
#[derive(Debug, Clone)]
pub struct MysqlQueryGenerator {
    options: GeneratorOptions,
}

impl MysqlQueryGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options: GeneratorOptions {
                dialect: DIALECT,
                ..options
            },
        }
    }

    /// Column definition without the column name.
    ///
    /// `PRIMARY KEY` is only kept when adding a column; CREATE TABLE states
    /// the key once at table level. References are never included here.
    fn column_definition(&self, attr: &AttributeDescriptor, context: ColumnContext) -> Result<String> {
        let mut sql = ddl::column_type(DIALECT, attr)?;
        if !attr.allow_null {
            sql.push_str(" NOT NULL");
        }
        if attr.auto_increment {
            sql.push_str(" auto_increment");
        }
        if let Some(default) = ddl::default_clause(DIALECT, attr) {
            sql.push_str(&default);
        }
        if attr.unique == Some(UniqueKey::Unnamed) {
            sql.push_str(" UNIQUE");
        }
        if attr.primary_key && context == ColumnContext::AddColumn {
            sql.push_str(" PRIMARY KEY");
        }
        if let Some(comment) = &attr.comment {
            sql.push_str(" COMMENT ");
            sql.push_str(&DIALECT.escape_string(comment));
        }
        Ok(sql)
    }

    /// ` ENGINE=.. DEFAULT CHARSET=.. COLLATE .. ROW_FORMAT=..`
    fn table_options(&self) -> String {
        let mut sql = format!(" ENGINE={}", self.options.engine);
        if let Some(charset) = &self.options.charset {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(collate) = &self.options.collate {
            sql.push_str(&format!(" COLLATE {collate}"));
        }
        if let Some(row_format) = &self.options.row_format {
            sql.push_str(&format!(" ROW_FORMAT={row_format}"));
        }
        sql
    }
}

impl Default for MysqlQueryGenerator {
    fn default() -> Self {
        Self::new(GeneratorOptions::new(DIALECT))
    }
}

impl QueryGenerator for MysqlQueryGenerator {
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
        let mut clauses = Vec::with_capacity(attributes.len() + 2);
        let mut foreign_keys = Vec::new();
        for attr in &attributes {
            let definition = self.column_definition(attr, ColumnContext::CreateTable)?;
            clauses.push(format!("{} {definition}", DIALECT.quote_identifier(&attr.field)));
            if let Some(references) = ddl::references_clause(DIALECT, attr) {
                foreign_keys.push(format!(
                    "FOREIGN KEY ({}) {references}",
                    DIALECT.quote_identifier(&attr.field)
                ));
            }
        }

        for (name, columns) in ddl::named_unique_keys(attributes.iter().copied()) {
            clauses.push(format!(
                "UNIQUE {} ({})",
                DIALECT.quote_identifier(name),
                ddl::quote_list(DIALECT, columns)
            ));
        }
        let primary_key = ddl::primary_key_columns(attributes.iter().copied());
        if !primary_key.is_empty() {
            clauses.push(format!("PRIMARY KEY ({})", ddl::quote_list(DIALECT, primary_key)));
        }
        clauses.extend(foreign_keys);

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}){};",
            DIALECT.quote_identifiers(&table),
            clauses.join(", "),
            self.table_options()
        );
        tracing::trace!(sql = %sql, "Generated CREATE TABLE");
        Ok(sql)
    }

    fn rename_table(&self, from: &str, to: &str) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, from = %from, to = %to, "Generating table rename");
        Ok(format!(
            "RENAME TABLE {} TO {};",
            DIALECT.quote_identifiers(from),
            DIALECT.quote_identifiers(to)
        ))
    }

    fn add_column(&self, table: &str, attribute: &AttributeDescriptor) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, table = %table, column = %attribute.field, "Generating ADD COLUMN");
        let column = DIALECT.quote_identifier(&attribute.field);
        let mut sql = format!(
            "ALTER TABLE {} ADD {column} {}",
            DIALECT.quote_identifiers(table),
            self.column_definition(attribute, ColumnContext::AddColumn)?
        );
        if let Some(references) = ddl::references_clause(DIALECT, attribute) {
            let constraint = format!("{}_{}_foreign_idx", ddl::bare_table_name(table), attribute.field);
            sql.push_str(&format!(
                ", ADD CONSTRAINT {} FOREIGN KEY ({column}) {references}",
                DIALECT.quote_identifier(&constraint)
            ));
        }
        sql.push(';');
        Ok(sql)
    }

    fn remove_column(&self, table: &str, column: &str) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, table = %table, column = %column, "Generating DROP COLUMN");
        Ok(format!(
            "ALTER TABLE {} DROP {};",
            DIALECT.quote_identifiers(table),
            DIALECT.quote_identifier(column)
        ))
    }

    fn change_column(&self, table: &str, attribute: &AttributeDescriptor) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, table = %table, column = %attribute.field, "Generating CHANGE COLUMN");
        let column = DIALECT.quote_identifier(&attribute.field);
        let mut sql = format!(
            "ALTER TABLE {} CHANGE {column} {column} {}",
            DIALECT.quote_identifiers(table),
            self.column_definition(attribute, ColumnContext::ChangeColumn)?
        );
        if let Some(references) = ddl::references_clause(DIALECT, attribute) {
            sql.push_str(&format!(", ADD FOREIGN KEY ({column}) {references}"));
        }
        sql.push(';');
        Ok(sql)
    }

    fn show_constraints(&self, table: &str, constraint: Option<&str>) -> Result<String> {
        let (schema, bare) = match table.rsplit_once('.') {
            Some((schema, bare)) => (Some(schema), bare),
            None => (None, table),
        };
        let mut sql = format!(
            "SELECT CONSTRAINT_CATALOG AS constraintCatalog, CONSTRAINT_NAME AS constraintName, \
             CONSTRAINT_SCHEMA AS constraintSchema, CONSTRAINT_TYPE AS constraintType, \
             TABLE_NAME AS tableName, TABLE_SCHEMA AS tableSchema \
             from INFORMATION_SCHEMA.TABLE_CONSTRAINTS WHERE table_name={}",
            DIALECT.escape_string(bare)
        );
        if let Some(constraint) = constraint {
            sql.push_str(&format!(" AND constraint_name = {}", DIALECT.escape_string(constraint)));
        }
        if let Some(schema) = schema {
            sql.push_str(&format!(" AND TABLE_SCHEMA = {}", DIALECT.escape_string(schema)));
        }
        sql.push(';');
        Ok(sql)
    }

    fn enable_foreign_key_constraints(&self) -> Option<String> {
        Some("SET FOREIGN_KEY_CHECKS=1;".to_string())
    }

    fn disable_foreign_key_constraints(&self) -> Option<String> {
        Some("SET FOREIGN_KEY_CHECKS=0;".to_string())
    }
}
