//! PostgreSQL query generator.
//!
//! Enums are named types created ahead of the table that uses them,
//! auto-increment integers become serial types, and column comments are
//! separate `COMMENT ON COLUMN` statements.

use super::QueryGenerator;
use crate::ddl::{self, ColumnContext};
use relmodel_core::{
    AttributeDescriptor, DataType, Dialect, GeneratorOptions, ModelDefinition, Result, UniqueKey,
};
use relmodel_core::types::enum_value_list;
use relmodel_query::join::table_ref;

const DIALECT: Dialect = Dialect::Postgres;

/// Query generator for PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresQueryGenerator {
    options: GeneratorOptions,
}

impl PostgresQueryGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options: GeneratorOptions {
                dialect: DIALECT,
                ..options
            },
        }
    }

    /// Quoted name of the enum type backing `table.column`, schema-qualified
    /// when the table is.
    pub fn enum_type_name(&self, table: &str, column: &str) -> String {
        match table.rsplit_once('.') {
            Some((schema, bare)) => format!(
                "{}.{}",
                DIALECT.quote_identifier(schema),
                DIALECT.quote_identifier(&format!("enum_{bare}_{column}"))
            ),
            None => DIALECT.quote_identifier(&format!("enum_{table}_{column}")),
        }
    }

    /// `CREATE TYPE ... AS ENUM(...); ` for an enum column, empty otherwise.
    fn create_enum_type(&self, table: &str, attr: &AttributeDescriptor) -> Result<String> {
        let DataType::Enum(values) = &attr.data_type else {
            return Ok(String::new());
        };
        // Validates the value list.
        attr.data_type.to_sql(DIALECT)?;
        Ok(format!(
            "CREATE TYPE {} AS ENUM({}); ",
            self.enum_type_name(table, &attr.field),
            enum_value_list(values, DIALECT)
        ))
    }

    fn column_type(&self, table: &str, attr: &AttributeDescriptor) -> Result<String> {
        match &attr.data_type {
            DataType::Enum(_) => {
                attr.data_type.to_sql(DIALECT)?;
                Ok(self.enum_type_name(table, &attr.field))
            }
            _ => ddl::column_type(DIALECT, attr),
        }
    }

    fn column_definition(
        &self,
        table: &str,
        attr: &AttributeDescriptor,
        context: ColumnContext,
    ) -> Result<String> {
        let serial = if attr.auto_increment {
            let serial = attr.data_type.serial_name();
            if serial.is_none() {
                tracing::warn!(
                    column = %attr.field,
                    data_type = ?attr.data_type,
                    "auto-increment ignored on a non-integer column"
                );
            }
            serial
        } else {
            None
        };

        let mut sql = match serial {
            Some(serial) => serial.to_string(),
            None => self.column_type(table, attr)?,
        };
        if !attr.allow_null && serial.is_none() {
            sql.push_str(" NOT NULL");
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
        if let Some(references) = ddl::references_clause(DIALECT, attr) {
            sql.push(' ');
            sql.push_str(&references);
        }
        Ok(sql)
    }

    fn column_comment(&self, table: &str, attr: &AttributeDescriptor) -> Option<String> {
        attr.comment.as_ref().map(|comment| {
            format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                DIALECT.quote_identifiers(table),
                DIALECT.quote_identifier(&attr.field),
                DIALECT.escape_string(comment)
            )
        })
    }
}

impl Default for PostgresQueryGenerator {
    fn default() -> Self {
        Self::new(GeneratorOptions::new(DIALECT))
    }
}

impl QueryGenerator for PostgresQueryGenerator {
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
        let mut enum_types = String::new();
        let mut clauses = Vec::with_capacity(attributes.len() + 1);
        let mut comments = Vec::new();
        for attr in &attributes {
            enum_types.push_str(&self.create_enum_type(&table, attr)?);
            let definition = self.column_definition(&table, attr, ColumnContext::CreateTable)?;
            clauses.push(format!("{} {definition}", DIALECT.quote_identifier(&attr.field)));
            comments.extend(self.column_comment(&table, attr));
        }

        for (name, columns) in ddl::named_unique_keys(attributes.iter().copied()) {
            clauses.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                DIALECT.quote_identifier(name),
                ddl::quote_list(DIALECT, columns)
            ));
        }
        let primary_key = ddl::primary_key_columns(attributes.iter().copied());
        if !primary_key.is_empty() {
            clauses.push(format!("PRIMARY KEY ({})", ddl::quote_list(DIALECT, primary_key)));
        }

        let mut sql = format!(
            "{enum_types}CREATE TABLE IF NOT EXISTS {} ({})",
            DIALECT.quote_identifiers(&table),
            clauses.join(", ")
        );
        for comment in comments {
            sql.push_str("; ");
            sql.push_str(&comment);
        }
        sql.push(';');
        tracing::trace!(sql = %sql, "Generated CREATE TABLE");
        Ok(sql)
    }

    fn add_column(&self, table: &str, attribute: &AttributeDescriptor) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, table = %table, column = %attribute.field, "Generating ADD COLUMN");
        let mut sql = format!(
            "{}ALTER TABLE {} ADD COLUMN {} {};",
            self.create_enum_type(table, attribute)?,
            DIALECT.quote_identifiers(table),
            DIALECT.quote_identifier(&attribute.field),
            self.column_definition(table, attribute, ColumnContext::AddColumn)?
        );
        if let Some(comment) = self.column_comment(table, attribute) {
            sql.push(' ');
            sql.push_str(&comment);
            sql.push(';');
        }
        Ok(sql)
    }

    /// One `ALTER TABLE` per property: nullability, default, uniqueness,
    /// type and foreign key.
    fn change_column(&self, table: &str, attribute: &AttributeDescriptor) -> Result<String> {
        tracing::debug!(dialect = %DIALECT, table = %table, column = %attribute.field, "Generating ALTER COLUMN");
        let quoted_table = DIALECT.quote_identifiers(table);
        let column = DIALECT.quote_identifier(&attribute.field);
        let alter = |action: String| format!("ALTER TABLE {quoted_table} ALTER COLUMN {column} {action};");

        let mut statements = Vec::new();
        let enum_type = self.create_enum_type(table, attribute)?;
        if !enum_type.is_empty() {
            statements.push(enum_type.trim_end().to_string());
        }
        statements.push(alter(if attribute.allow_null {
            "DROP NOT NULL".to_string()
        } else {
            "SET NOT NULL".to_string()
        }));
        statements.push(alter(match ddl::default_clause(DIALECT, attribute) {
            Some(default) => format!("SET{default}"),
            None => "DROP DEFAULT".to_string(),
        }));
        if attribute.unique == Some(UniqueKey::Unnamed) {
            statements.push(format!("ALTER TABLE {quoted_table} ADD UNIQUE ({column});"));
        }
        let mut type_change = format!("TYPE {}", self.column_type(table, attribute)?);
        if matches!(attribute.data_type, DataType::Enum(_)) {
            type_change.push_str(&format!(
                " USING ({column}::{})",
                self.enum_type_name(table, &attribute.field)
            ));
        }
        statements.push(alter(type_change));
        if let Some(references) = ddl::references_clause(DIALECT, attribute) {
            statements.push(format!(
                "ALTER TABLE {quoted_table} ADD FOREIGN KEY ({column}) {references};"
            ));
        }
        if let Some(comment) = self.column_comment(table, attribute) {
            statements.push(format!("{comment};"));
        }
        Ok(statements.join(" "))
    }

    fn show_constraints(&self, table: &str, constraint: Option<&str>) -> Result<String> {
        let (schema, bare) = match table.rsplit_once('.') {
            Some((schema, bare)) => (Some(schema), bare),
            None => (None, table),
        };
        let mut sql = format!(
            "SELECT constraint_catalog AS \"constraintCatalog\", constraint_schema AS \"constraintSchema\", \
             constraint_name AS \"constraintName\", table_catalog AS \"tableCatalog\", \
             table_schema AS \"tableSchema\", table_name AS \"tableName\", \
             constraint_type AS \"constraintType\", is_deferrable AS \"isDeferrable\", \
             initially_deferred AS \"initiallyDeferred\" \
             from INFORMATION_SCHEMA.table_constraints WHERE table_name={}",
            DIALECT.escape_string(bare)
        );
        if let Some(constraint) = constraint {
            sql.push_str(&format!(" AND constraint_name={}", DIALECT.escape_string(constraint)));
        }
        if let Some(schema) = schema {
            sql.push_str(&format!(" AND table_schema={}", DIALECT.escape_string(schema)));
        }
        sql.push(';');
        Ok(sql)
    }
}
