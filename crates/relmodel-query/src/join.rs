//! JOIN clauses and the include planner.
//!
//! The planner turns a list of [`Include`]s into JOIN clauses plus aliased
//! include columns. Included tables are aliased by their path from the main
//! model (`tasks`, `tasks->subtasks`) and their columns by `"<path>.<column>"`,
//! so the same target model can appear at several paths without collisions.
//!
//! Multi-valued includes carrying a per-parent `limit` cannot be joined
//! without breaking the limit; they are split off into
//! [`GroupedLimitPlan`]s instead.

use crate::grouped::GroupedLimitPlan;
use crate::options::Include;
use crate::where_clause::{Predicate, WhereCompiler};
use indexmap::IndexMap;
use relmodel_core::{
    Association, AssociationGraph, Dialect, Error, GroupedLimitStrategy, ModelDefinition, ModelId,
    Result,
};

/// Types of SQL joins used for includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// A column qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            column: column.into(),
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        format!(
            "{}.{}",
            dialect.quote_identifiers(&self.qualifier),
            dialect.quote_identifier(&self.column)
        )
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    /// Table to join, optionally schema-qualified
    pub table: String,
    pub alias: Option<String>,
    /// Column equalities making up the ON condition
    pub on: Vec<(ColumnRef, ColumnRef)>,
    /// Extra conditions, qualified with the alias (or table)
    pub condition: Predicate,
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            alias: None,
            on: Vec::new(),
            condition: Predicate::empty(),
        }
    }

    /// Create an INNER JOIN.
    pub fn inner(table: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, table)
    }

    /// Create a LEFT OUTER JOIN.
    pub fn left_outer(table: impl Into<String>) -> Self {
        Self::new(JoinType::LeftOuter, table)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add `left = right` to the ON condition.
    pub fn on(mut self, left: ColumnRef, right: ColumnRef) -> Self {
        self.on.push((left, right));
        self
    }

    pub fn condition(mut self, predicate: Predicate) -> Self {
        self.condition = predicate;
        self
    }

    /// Name other clauses use to refer to the joined table.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Render the clause without a leading space.
    pub fn to_sql(&self, compiler: &WhereCompiler) -> Result<String> {
        let dialect = compiler.dialect();
        let mut sql = format!(
            "{} {}",
            self.join_type.as_str(),
            dialect.quote_identifiers(&self.table)
        );
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }

        let mut conditions: Vec<String> = self
            .on
            .iter()
            .map(|(left, right)| format!("{} = {}", left.to_sql(dialect), right.to_sql(dialect)))
            .collect();
        if let Some(extra) = compiler.compile(&self.condition, Some(self.qualifier()))? {
            conditions.push(extra);
        }
        if !conditions.is_empty() {
            sql.push_str(" ON ");
            sql.push_str(&conditions.join(" AND "));
        }
        Ok(sql)
    }
}

/// Where an aliased include column comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasedColumn {
    /// Include path, e.g. `tasks->subtasks`
    pub path: String,
    pub column: String,
}

/// Output of [`JoinPlanner::plan`].
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    pub joins: Vec<Join>,
    /// Rendered `path.column AS "path.column"` select items
    pub attributes: Vec<String>,
    /// Column alias to its source
    pub alias_map: IndexMap<String, AliasedColumn>,
    /// Includes executed as separate per-parent-limited queries
    pub grouped: Vec<GroupedLimitPlan>,
    /// Whether any joined include can yield several rows per parent
    pub multiplies_rows: bool,
}

impl JoinPlan {
    /// All JOIN clauses, each with a leading space.
    pub fn joined_sql(&self, compiler: &WhereCompiler) -> Result<String> {
        let mut sql = String::new();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql(compiler)?);
        }
        Ok(sql)
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.grouped.is_empty()
    }
}

/// Plans includes against a frozen association graph.
#[derive(Debug, Clone)]
pub struct JoinPlanner<'g> {
    graph: &'g AssociationGraph,
    dialect: Dialect,
    strategy: GroupedLimitStrategy,
}

impl<'g> JoinPlanner<'g> {
    pub fn new(graph: &'g AssociationGraph, dialect: Dialect) -> Self {
        Self {
            graph,
            dialect,
            strategy: GroupedLimitStrategy::Auto,
        }
    }

    /// Strategy used for per-parent limits.
    pub fn grouped_limit_strategy(mut self, strategy: GroupedLimitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Plan `includes` on `model`, whose table is referred to as `main_alias`.
    pub fn plan(&self, model: ModelId, main_alias: &str, includes: &[Include]) -> Result<JoinPlan> {
        let mut plan = JoinPlan::default();
        for include in includes {
            self.plan_include(&mut plan, model, main_alias, None, include)?;
        }
        tracing::debug!(
            dialect = %self.dialect,
            joins = plan.joins.len(),
            grouped = plan.grouped.len(),
            "Planned includes"
        );
        Ok(plan)
    }

    fn plan_include(
        &self,
        plan: &mut JoinPlan,
        parent: ModelId,
        parent_alias: &str,
        parent_path: Option<&str>,
        include: &Include,
    ) -> Result<()> {
        let association = self.graph.require(parent, &include.association)?;
        let target = self.graph.model(association.target())?;
        let path = match parent_path {
            Some(parent_path) => format!("{parent_path}->{}", association.alias()),
            None => association.alias().to_string(),
        };

        if association.is_multi() && include.limit.is_some() {
            if parent_path.is_some() {
                return Err(Error::unsupported(
                    "a per-parent limit on a nested include",
                    self.dialect.name(),
                ));
            }
            if !include.include.is_empty() {
                return Err(Error::unsupported(
                    "nested includes under a per-parent limit",
                    self.dialect.name(),
                ));
            }
            plan.grouped.push(GroupedLimitPlan::new(
                self.graph,
                association,
                include,
                self.dialect,
                self.strategy,
            )?);
            return Ok(());
        }

        let join_type = if include.is_required() {
            JoinType::Inner
        } else {
            JoinType::LeftOuter
        };
        let target_table = table_ref(target);

        match association {
            Association::BelongsTo(belongs_to) => {
                plan.joins.push(
                    Join::new(join_type, target_table)
                        .alias(path.clone())
                        .on(
                            ColumnRef::new(parent_alias, &belongs_to.core.foreign_key_field),
                            ColumnRef::new(&path, &belongs_to.target_key_field),
                        )
                        .condition(include.where_clause.clone()),
                );
            }
            Association::HasOne(has) | Association::HasMany(has) => {
                plan.joins.push(
                    Join::new(join_type, target_table)
                        .alias(path.clone())
                        .on(
                            ColumnRef::new(parent_alias, &has.source_key_field),
                            ColumnRef::new(&path, &has.core.foreign_key_field),
                        )
                        .condition(include.where_clause.clone()),
                );
            }
            Association::BelongsToMany(many) => {
                let through = self.graph.model(many.through)?;
                let through_path = format!("{path}->{}", through.name);
                plan.joins.push(
                    Join::new(join_type, table_ref(through))
                        .alias(through_path.clone())
                        .on(
                            ColumnRef::new(parent_alias, &many.source_key_field),
                            ColumnRef::new(&through_path, &many.core.foreign_key_field),
                        ),
                );
                plan.joins.push(
                    Join::new(join_type, target_table)
                        .alias(path.clone())
                        .on(
                            ColumnRef::new(&path, &many.target_key_field),
                            ColumnRef::new(&through_path, &many.other_key_field),
                        )
                        .condition(include.where_clause.clone()),
                );
                for column in [&many.core.foreign_key_field, &many.other_key_field] {
                    self.push_attribute(plan, &through_path, column);
                }
            }
        }
        plan.multiplies_rows |= association.is_multi();

        for column in include_columns(target, include.attributes.as_deref()) {
            self.push_attribute(plan, &path, &column);
        }

        for nested in &include.include {
            self.plan_include(plan, association.target(), &path, Some(&path), nested)?;
        }
        Ok(())
    }

    fn push_attribute(&self, plan: &mut JoinPlan, path: &str, column: &str) {
        let alias = format!("{path}.{column}");
        plan.attributes.push(format!(
            "{} AS {}",
            ColumnRef::new(path, column).to_sql(self.dialect),
            self.dialect.quote_identifier(&alias)
        ));
        plan.alias_map.insert(
            alias,
            AliasedColumn {
                path: path.to_string(),
                column: column.to_string(),
            },
        );
    }
}

/// Table reference of a model, schema-qualified when it has one.
pub fn table_ref(model: &ModelDefinition) -> String {
    match &model.schema {
        Some(schema) => format!("{schema}.{}", model.table_name),
        None => model.table_name.clone(),
    }
}

/// Column names to select from an included model. Requested attributes are
/// mapped to their fields and the primary key is always kept.
pub(crate) fn include_columns(model: &ModelDefinition, attributes: Option<&[String]>) -> Vec<String> {
    let Some(attributes) = attributes else {
        return model.column_names().map(str::to_string).collect();
    };
    let mut columns: Vec<String> = model
        .primary_key_fields()
        .into_iter()
        .map(str::to_string)
        .collect();
    for attribute in attributes {
        let column = model.column_name(attribute).to_string();
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}
