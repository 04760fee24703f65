//! INSERT, UPDATE and DELETE statements shared by every dialect.

use crate::where_clause::{Predicate, WhereCompiler};
use indexmap::IndexSet;
use relmodel_core::{
    DeleteLimit, Dialect, Error, GenerationErrorKind, Result, Row, Value,
};

/// Rows an INSERT or UPDATE should hand back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Returning {
    #[default]
    None,
    All,
    Columns(Vec<String>),
}

impl Returning {
    pub fn is_requested(&self) -> bool {
        !matches!(self, Returning::None)
    }

    /// ` RETURNING ...`, or nothing when not requested. Dialects without
    /// RETURNING drop the request.
    fn clause(&self, dialect: Dialect, table: &str) -> String {
        if !self.is_requested() {
            return String::new();
        }
        if !dialect.supports_returning() {
            tracing::warn!(
                dialect = %dialect,
                table = %table,
                "RETURNING is not supported by this dialect; dropping it"
            );
            return String::new();
        }
        match self {
            Returning::Columns(columns) if !columns.is_empty() => format!(
                " RETURNING {}",
                columns
                    .iter()
                    .map(|c| dialect.quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            _ => " RETURNING *".to_string(),
        }
    }
}

/// Options of INSERT and bulk INSERT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOptions {
    pub returning: Returning,
    /// Skip rows that violate a unique constraint
    pub ignore_duplicates: bool,
    /// Columns overwritten when the row already exists
    pub update_on_duplicate: Option<Vec<String>>,
    /// Conflict target for `ON CONFLICT (...) DO UPDATE`
    pub conflict_keys: Vec<String>,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    pub fn ignore_duplicates(mut self, ignore: bool) -> Self {
        self.ignore_duplicates = ignore;
        self
    }

    pub fn update_on_duplicate<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_on_duplicate = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn conflict_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Options of UPDATE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub returning: Returning,
}

/// Options of DELETE and bulk DELETE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub limit: Option<u64>,
    /// Primary key columns; needed where DELETE limits go through a subselect
    pub primary_keys: Vec<String>,
    /// Empty the table with [`truncate_query`] instead
    pub truncate: bool,
    pub truncate_options: TruncateOptions,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn truncate(mut self, options: TruncateOptions) -> Self {
        self.truncate = true;
        self.truncate_options = options;
        self
    }
}

/// Postgres TRUNCATE modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TruncateOptions {
    pub restart_identity: bool,
    pub cascade: bool,
}

/// INSERT of one row.
///
/// With `omit_null` NULL values are dropped from the column list. A row left
/// without columns inserts defaults only.
pub fn insert_query(
    dialect: Dialect,
    table: &str,
    row: &Row,
    omit_null: bool,
    options: &InsertOptions,
) -> Result<String> {
    let row = if omit_null { row.without_nulls() } else { row.clone() };
    tracing::debug!(
        dialect = %dialect,
        table = %table,
        columns = row.len(),
        omit_null,
        "Generating INSERT"
    );

    let columns: Vec<&str> = row.columns().collect();
    let values = if columns.is_empty() {
        dialect.empty_insert_values().to_string()
    } else {
        let literals: Vec<String> = row.iter().map(|(_, v)| dialect.escape(v)).collect();
        format!(
            " ({}) VALUES ({})",
            quote_list(dialect, columns.iter().copied()),
            literals.join(",")
        )
    };
    let sql = finish_insert(dialect, table, &values, options)?;
    tracing::trace!(sql = %sql, "Generated INSERT");
    Ok(sql)
}

/// Multi-row INSERT.
///
/// The column list is the union of every row's columns in first-seen order;
/// a row missing a column contributes `NULL`. `omit_null` does not apply.
pub fn bulk_insert_query(
    dialect: Dialect,
    table: &str,
    rows: &[Row],
    options: &InsertOptions,
) -> Result<String> {
    if rows.is_empty() {
        return Err(Error::generation(
            GenerationErrorKind::EmptyValues,
            format!("bulk insert into \"{table}\" has no rows"),
        ));
    }
    tracing::debug!(dialect = %dialect, table = %table, rows = rows.len(), "Generating bulk INSERT");

    let columns: IndexSet<&str> = rows.iter().flat_map(Row::columns).collect();
    let values = if columns.is_empty() {
        dialect.empty_insert_values().to_string()
    } else {
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let literals: Vec<String> = columns
                    .iter()
                    .map(|c| dialect.escape(row.get(c).unwrap_or(&Value::Null)))
                    .collect();
                format!("({})", literals.join(","))
            })
            .collect();
        format!(
            " ({}) VALUES {}",
            quote_list(dialect, columns.iter().copied()),
            tuples.join(",")
        )
    };
    let sql = finish_insert(dialect, table, &values, options)?;
    tracing::trace!(sql = %sql, "Generated bulk INSERT");
    Ok(sql)
}

fn finish_insert(dialect: Dialect, table: &str, values: &str, options: &InsertOptions) -> Result<String> {
    let upsert = match &options.update_on_duplicate {
        Some(columns) if !columns.is_empty() => Some(upsert_clause(dialect, table, columns, options)?),
        _ => None,
    };
    let ignore = options.ignore_duplicates && upsert.is_none();

    let mut sql = format!(
        "INSERT{} INTO {}{values}",
        if ignore { dialect.insert_ignore_keyword() } else { "" },
        dialect.quote_identifiers(table)
    );
    match upsert {
        Some(clause) => sql.push_str(&clause),
        None if ignore => sql.push_str(dialect.insert_ignore_suffix()),
        None => {}
    }
    sql.push_str(&options.returning.clause(dialect, table));
    sql.push(';');
    Ok(sql)
}

fn upsert_clause(
    dialect: Dialect,
    table: &str,
    columns: &[String],
    options: &InsertOptions,
) -> Result<String> {
    if dialect == Dialect::Mysql {
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| {
                let column = dialect.quote_identifier(c);
                format!("{column}=VALUES({column})")
            })
            .collect();
        return Ok(format!(" ON DUPLICATE KEY UPDATE {}", assignments.join(",")));
    }

    if options.conflict_keys.is_empty() {
        return Err(Error::generation(
            GenerationErrorKind::MissingPrimaryKey,
            format!("updating \"{table}\" on duplicate needs the conflicting key columns"),
        ));
    }
    let assignments: Vec<String> = columns
        .iter()
        .map(|c| {
            let column = dialect.quote_identifier(c);
            format!("{column}=EXCLUDED.{column}")
        })
        .collect();
    Ok(format!(
        " ON CONFLICT ({}) DO UPDATE SET {}",
        quote_list(dialect, options.conflict_keys.iter().map(String::as_str)),
        assignments.join(",")
    ))
}

/// UPDATE of the rows matching `where_clause`.
pub fn update_query(
    dialect: Dialect,
    table: &str,
    values: &Row,
    where_clause: &Predicate,
    omit_null: bool,
    options: &UpdateOptions,
) -> Result<String> {
    let values = if omit_null { values.without_nulls() } else { values.clone() };
    if values.is_empty() {
        return Err(Error::generation(
            GenerationErrorKind::EmptyValues,
            format!("update of \"{table}\" has no values to set"),
        ));
    }
    tracing::debug!(
        dialect = %dialect,
        table = %table,
        columns = values.len(),
        omit_null,
        "Generating UPDATE"
    );

    let assignments: Vec<String> = values
        .iter()
        .map(|(column, value)| {
            format!("{}={}", dialect.quote_identifier(column), dialect.escape(value))
        })
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_identifiers(table),
        assignments.join(",")
    );
    if let Some(condition) = WhereCompiler::new(dialect).compile(where_clause, None)? {
        sql.push_str(" WHERE ");
        sql.push_str(&condition);
    }
    sql.push_str(&options.returning.clause(dialect, table));

    tracing::trace!(sql = %sql, "Generated UPDATE");
    Ok(sql)
}

/// DELETE of the rows matching `where_clause`.
///
/// A limit is native on MySQL, goes through a primary key subselect on
/// Postgres and is dropped on SQLite.
pub fn delete_query(
    dialect: Dialect,
    table: &str,
    where_clause: &Predicate,
    options: &DeleteOptions,
) -> Result<String> {
    if options.truncate {
        return Ok(truncate_query(dialect, table, options.truncate_options));
    }
    tracing::debug!(dialect = %dialect, table = %table, limit = ?options.limit, "Generating DELETE");

    let compiler = WhereCompiler::new(dialect);
    let quoted = dialect.quote_identifiers(table);
    let condition = compiler.compile(where_clause, None)?;
    let mut sql = format!("DELETE FROM {quoted}");

    match (options.limit, dialect.delete_limit()) {
        (Some(limit), DeleteLimit::Native) => {
            push_where(&mut sql, condition.as_deref());
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (Some(limit), DeleteLimit::PrimaryKeySubselect) => {
            if options.primary_keys.is_empty() {
                return Err(Error::generation(
                    GenerationErrorKind::MissingPrimaryKey,
                    format!("a limited delete from \"{table}\" needs the primary key columns"),
                ));
            }
            let keys = quote_list(dialect, options.primary_keys.iter().map(String::as_str));
            let target = if options.primary_keys.len() == 1 {
                keys.clone()
            } else {
                format!("({keys})")
            };
            let mut subselect = format!("SELECT {keys} FROM {quoted}");
            push_where(&mut subselect, condition.as_deref());
            sql.push_str(&format!(" WHERE {target} IN ({subselect} LIMIT {limit})"));
        }
        (Some(_), DeleteLimit::Ignored) => {
            tracing::warn!(
                dialect = %dialect,
                table = %table,
                "DELETE has no LIMIT in this dialect; deleting every matching row"
            );
            push_where(&mut sql, condition.as_deref());
        }
        (None, _) => push_where(&mut sql, condition.as_deref()),
    }

    tracing::trace!(sql = %sql, "Generated DELETE");
    Ok(sql)
}

/// Empty a table. SQLite has no TRUNCATE and deletes every row instead.
pub fn truncate_query(dialect: Dialect, table: &str, options: TruncateOptions) -> String {
    let quoted = dialect.quote_identifiers(table);
    let sql = match dialect {
        Dialect::Sqlite => format!("DELETE FROM {quoted}"),
        Dialect::Mysql => format!("TRUNCATE {quoted}"),
        Dialect::Postgres => {
            let mut sql = format!("TRUNCATE {quoted}");
            if options.restart_identity {
                sql.push_str(" RESTART IDENTITY");
            }
            if options.cascade {
                sql.push_str(" CASCADE");
            }
            sql
        }
    };
    tracing::trace!(dialect = %dialect, sql = %sql, "Generated TRUNCATE");
    sql
}

fn push_where(sql: &mut String, condition: Option<&str>) {
    if let Some(condition) = condition {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }
}

fn quote_list<'a>(dialect: Dialect, columns: impl Iterator<Item = &'a str>) -> String {
    columns
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(",")
}
