//! SELECT statement assembly.
//!
//! [`select_query`] renders a SELECT against a bare table. [`find_query`]
//! renders one against a model and plans its includes through the
//! [`JoinPlanner`].

use crate::grouped::GroupedLimitPlan;
use crate::join::{AliasedColumn, ColumnRef, Join, JoinPlanner, table_ref};
use crate::options::{Attribute, FindOptions, GroupItem, OrderItem};
use crate::where_clause::WhereCompiler;
use indexmap::IndexMap;
use relmodel_core::{
    AssociationGraph, Dialect, Error, GenerationErrorKind, GeneratorOptions, ModelId, Result,
};

/// Output of [`find_query`].
#[derive(Debug, Clone)]
pub struct FindQuery {
    /// Main statement with joined includes
    pub sql: String,
    /// Include column alias to its source
    pub alias_map: IndexMap<String, AliasedColumn>,
    /// Limited includes to be loaded after the main statement ran
    pub grouped: Vec<GroupedLimitPlan>,
}

/// SELECT against a table.
///
/// # Errors
///
/// Includes need a model and are rejected with `UnknownAssociation`; use
/// [`find_query`] for them.
pub fn select_query(dialect: Dialect, table: &str, options: &FindOptions) -> Result<String> {
    select_with_joins(dialect, table, options, &[])
}

/// SELECT against a table with explicit JOIN clauses.
pub fn select_with_joins(
    dialect: Dialect,
    table: &str,
    options: &FindOptions,
    joins: &[Join],
) -> Result<String> {
    if let Some(include) = options.include.first() {
        return Err(Error::generation(
            GenerationErrorKind::UnknownAssociation,
            format!(
                "include \"{}\" cannot be resolved against the bare table \"{table}\"",
                include.association
            ),
        ));
    }

    let compiler = WhereCompiler::new(dialect);
    let table_ref = options.table_ref(table);
    let attributes = match &options.attributes {
        Some(attributes) if !attributes.is_empty() => attributes
            .iter()
            .map(|a| attribute_sql(&compiler, a, None))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "*".to_string(),
    };

    let mut sql = format!(
        "SELECT {attributes} FROM {}",
        dialect.quote_identifiers(&table_ref)
    );
    for join in joins {
        sql.push(' ');
        sql.push_str(&join.to_sql(&compiler)?);
    }
    push_filters(&mut sql, &compiler, options, Some(&table_ref), None)?;
    push_order_limit(&mut sql, &compiler, options, None);
    sql.push(';');

    tracing::trace!(dialect = %dialect, table = %table_ref, sql = %sql, "Generated SELECT");
    Ok(sql)
}

/// SELECT against a model, joining its includes.
///
/// Without includes this is [`select_query`] on the model's table. With
/// includes the main table is aliased by the model name, the default column
/// list becomes the model's qualified columns followed by the aliased include
/// columns, and a `limit` combined with a row-multiplying join is applied in
/// a derived table so that it caps parents rather than joined rows.
pub fn find_query(
    graph: &AssociationGraph,
    model: ModelId,
    options: &FindOptions,
    generator: &GeneratorOptions,
) -> Result<FindQuery> {
    let dialect = generator.dialect;
    let definition = graph.model(model)?;
    let table = if options.schema.is_some() {
        definition.table_name.clone()
    } else {
        table_ref(definition)
    };
    tracing::debug!(
        dialect = %dialect,
        model = %definition.name,
        includes = options.include.len(),
        "Generating find query"
    );

    if options.include.is_empty() {
        return Ok(FindQuery {
            sql: select_query(dialect, &table, options)?,
            alias_map: IndexMap::new(),
            grouped: Vec::new(),
        });
    }

    let main_alias = definition.name.as_str();
    let plan = JoinPlanner::new(graph, dialect)
        .grouped_limit_strategy(generator.grouped_limit_strategy)
        .plan(model, main_alias, &options.include)?;
    let compiler = WhereCompiler::new(dialect);

    let mut main_columns: Vec<String> = match &options.attributes {
        Some(attributes) if !attributes.is_empty() => attributes
            .iter()
            .map(|a| attribute_sql(&compiler, a, Some(main_alias)))
            .collect(),
        _ => definition
            .column_names()
            .map(|column| ColumnRef::new(main_alias, column).to_sql(dialect))
            .collect(),
    };
    for grouped in &plan.grouped {
        let key = ColumnRef::new(main_alias, &grouped.parent_key).to_sql(dialect);
        if !main_columns.contains(&key) {
            main_columns.push(key);
        }
    }

    let from = format!(
        "{} AS {}",
        dialect.quote_identifiers(&options.table_ref(&table)),
        dialect.quote_identifier(main_alias)
    );
    let joins = plan.joined_sql(&compiler)?;

    let mut sql = if options.limit.is_some() && plan.multiplies_rows {
        let mut inner = format!("SELECT {} FROM {from}", main_columns.join(", "));
        push_filters(&mut inner, &compiler, options, Some(main_alias), Some(main_alias))?;
        push_order_limit(&mut inner, &compiler, options, Some(main_alias));

        let mut items = vec![format!("{}.*", dialect.quote_identifier(main_alias))];
        items.extend(plan.attributes.iter().cloned());
        let mut sql = format!(
            "SELECT {} FROM ({inner}) AS {}{joins}",
            items.join(", "),
            dialect.quote_identifier(main_alias)
        );
        if let Some(order) = order_by(&compiler, &options.order, Some(main_alias)) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        sql
    } else {
        let mut items = main_columns;
        items.extend(plan.attributes.iter().cloned());
        let mut sql = format!("SELECT {} FROM {from}{joins}", items.join(", "));
        push_filters(&mut sql, &compiler, options, Some(main_alias), Some(main_alias))?;
        push_order_limit(&mut sql, &compiler, options, Some(main_alias));
        sql
    };
    sql.push(';');

    tracing::trace!(dialect = %dialect, sql = %sql, "Generated find query");
    Ok(FindQuery {
        sql,
        alias_map: plan.alias_map,
        grouped: plan.grouped,
    })
}

fn push_filters(
    sql: &mut String,
    compiler: &WhereCompiler,
    options: &FindOptions,
    where_qualifier: Option<&str>,
    column_qualifier: Option<&str>,
) -> Result<()> {
    if let Some(condition) = compiler.compile(&options.where_clause, where_qualifier)? {
        sql.push_str(" WHERE ");
        sql.push_str(&condition);
    }
    if let Some(group) = group_by(compiler, &options.group, column_qualifier) {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group);
    }
    if let Some(having) = compiler.compile(&options.having, None)? {
        sql.push_str(" HAVING ");
        sql.push_str(&having);
    }
    Ok(())
}

fn push_order_limit(
    sql: &mut String,
    compiler: &WhereCompiler,
    options: &FindOptions,
    qualifier: Option<&str>,
) {
    if let Some(order) = order_by(compiler, &options.order, qualifier) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }
    sql.push_str(&compiler.dialect().limit_clause(options.limit, options.offset));
}

fn attribute_sql(compiler: &WhereCompiler, attribute: &Attribute, qualifier: Option<&str>) -> String {
    let dialect = compiler.dialect();
    match attribute {
        Attribute::Column(column) if column == "*" => match qualifier {
            Some(q) => format!("{}.*", dialect.quote_identifiers(q)),
            None => "*".to_string(),
        },
        Attribute::Column(column) => compiler.column(column, qualifier),
        Attribute::Aliased { expr, alias } => {
            format!("{expr} AS {}", dialect.quote_identifier(alias))
        }
        Attribute::Raw(sql) => sql.clone(),
    }
}

/// ORDER BY items joined with `, `, or `None` when there are none.
pub(crate) fn order_by(
    compiler: &WhereCompiler,
    items: &[OrderItem],
    qualifier: Option<&str>,
) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let rendered: Vec<String> = items
        .iter()
        .map(|item| match item {
            OrderItem::Column { column, direction } => {
                format!("{} {}", compiler.column(column, qualifier), direction.as_sql())
            }
            OrderItem::Raw(sql) => sql.clone(),
        })
        .collect();
    Some(rendered.join(", "))
}

fn group_by(compiler: &WhereCompiler, items: &[GroupItem], qualifier: Option<&str>) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let rendered: Vec<String> = items
        .iter()
        .map(|item| match item {
            GroupItem::Column(column) => compiler.column(column, qualifier),
            GroupItem::Raw(sql) => sql.clone(),
        })
        .collect();
    Some(rendered.join(", "))
}
