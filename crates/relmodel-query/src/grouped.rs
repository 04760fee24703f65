//! Per-parent limits on eager-loaded collections.
//!
//! Joining a HasMany or BelongsToMany include multiplies parent rows, so a
//! `limit` on the include cannot be expressed in the main statement. A
//! [`GroupedLimitPlan`] instead renders child statements for a set of parent
//! keys, using one of three strategies:
//!
//! - `Union`: one derived table per parent key, joined with `UNION ALL`
//! - `Window`: `ROW_NUMBER() OVER (PARTITION BY <key>)` filtered by the limit
//! - `Separate`: one statement per parent key
//!
//! [`GroupedLimitPlan::stitch`] recombines the child rows with their parents.

use crate::join::{ColumnRef, Join, include_columns, table_ref};
use crate::options::{Include, OrderItem};
use crate::select::order_by;
use crate::where_clause::{Predicate, WhereCompiler};
use relmodel_core::{
    Association, AssociationGraph, Dialect, Error, GenerationErrorKind, GroupedLimitStrategy,
    Result, Row, Value, ValueKey,
};
use std::collections::{HashMap, HashSet};

const SUBQUERY_ALIAS: &str = "sub";
const ROW_NUMBER_ALIAS: &str = "row_number";

/// A parent row with its capped children.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRows {
    pub parent: Row,
    pub children: Vec<Row>,
}

/// Child statements and stitching for one limited include.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedLimitPlan {
    dialect: Dialect,
    /// Alias of the include
    pub association: String,
    /// Resolved strategy, never `Auto`
    pub strategy: GroupedLimitStrategy,
    pub limit: u64,
    /// Column on parent rows holding the key children are grouped under
    pub parent_key: String,
    /// Column on child rows holding the parent key
    pub child_key: String,
    table: String,
    alias: String,
    columns: Vec<String>,
    through: Option<Join>,
    key_column: ColumnRef,
    where_clause: Predicate,
    order: Vec<OrderItem>,
}

impl GroupedLimitPlan {
    pub(crate) fn new(
        graph: &AssociationGraph,
        association: &Association,
        include: &Include,
        dialect: Dialect,
        strategy: GroupedLimitStrategy,
    ) -> Result<Self> {
        let target = graph.model(association.target())?;
        let alias = association.alias().to_string();
        let limit = include.limit.unwrap_or(u64::MAX);
        let mut columns: Vec<String> = include_columns(target, include.attributes.as_deref())
            .iter()
            .map(|column| ColumnRef::new(&alias, column).to_sql(dialect))
            .collect();

        let (parent_key, child_key, key_column, through) = match association {
            Association::HasMany(has) => {
                let key_column = ColumnRef::new(&alias, &has.core.foreign_key_field);
                let rendered = key_column.to_sql(dialect);
                if !columns.contains(&rendered) {
                    columns.push(rendered);
                }
                (
                    has.source_key_field.clone(),
                    has.core.foreign_key_field.clone(),
                    key_column,
                    None,
                )
            }
            Association::BelongsToMany(many) => {
                let through_model = graph.model(many.through)?;
                let through_alias = through_model.name.clone();
                let key_column = ColumnRef::new(&through_alias, &many.core.foreign_key_field);
                let child_key = format!("{through_alias}.{}", many.core.foreign_key_field);
                columns.push(format!(
                    "{} AS {}",
                    key_column.to_sql(dialect),
                    dialect.quote_identifier(&child_key)
                ));
                let join = Join::inner(table_ref(through_model))
                    .alias(through_alias.clone())
                    .on(
                        ColumnRef::new(&alias, &many.target_key_field),
                        ColumnRef::new(&through_alias, &many.other_key_field),
                    );
                (many.source_key_field.clone(), child_key, key_column, Some(join))
            }
            Association::BelongsTo(_) | Association::HasOne(_) => {
                return Err(Error::unsupported(
                    "a per-parent limit on a single-valued include",
                    dialect.name(),
                ));
            }
        };

        Ok(Self {
            dialect,
            association: alias.clone(),
            strategy: strategy.resolve(dialect),
            limit,
            parent_key,
            child_key,
            table: table_ref(target),
            alias,
            columns,
            through,
            key_column,
            where_clause: include.where_clause.clone(),
            order: include.order.clone(),
        })
    }

    /// Distinct non-null parent keys, in first-seen order.
    pub fn parent_keys(&self, parents: &[Row]) -> Result<Vec<Value>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for parent in parents {
            let value = parent.get(&self.parent_key).ok_or_else(|| self.missing_key())?;
            match value.key() {
                Some(ValueKey::Null) | None => {}
                Some(key) => {
                    if seen.insert(key) {
                        keys.push(value.clone());
                    }
                }
            }
        }
        Ok(keys)
    }

    /// Child statements for the given parent keys. No keys, no statements.
    pub fn statements(&self, parent_keys: &[Value]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let keys: Vec<&Value> = parent_keys
            .iter()
            .filter(|v| match v.key() {
                Some(ValueKey::Null) | None => false,
                Some(key) => seen.insert(key),
            })
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let compiler = WhereCompiler::new(self.dialect);
        let dialect = self.dialect;
        let sub = dialect.quote_identifier(SUBQUERY_ALIAS);
        let statements = match self.strategy {
            GroupedLimitStrategy::Auto | GroupedLimitStrategy::Union => {
                let mut parts = Vec::with_capacity(keys.len());
                for key in &keys {
                    let child = self.child_select(&compiler, &self.key_equals(key), true, None)?;
                    parts.push(format!("SELECT * FROM ({child}) AS {sub}"));
                }
                vec![format!("{};", parts.join(" UNION ALL "))]
            }
            GroupedLimitStrategy::Window => {
                let partition = self.key_column.to_sql(dialect);
                let over = match order_by(&compiler, &self.order, Some(&self.alias)) {
                    Some(order) => format!("PARTITION BY {partition} ORDER BY {order}"),
                    None => format!("PARTITION BY {partition}"),
                };
                let row_number = dialect.quote_identifier(ROW_NUMBER_ALIAS);
                let keys: Vec<Value> = keys.iter().map(|v| (*v).clone()).collect();
                let inner = self.child_select(
                    &compiler,
                    &Predicate::in_list(self.key_column.column.clone(), keys),
                    false,
                    Some(format!("ROW_NUMBER() OVER ({over}) AS {row_number}")),
                )?;
                let child_key = dialect.quote_identifier(&self.child_key);
                vec![format!(
                    "SELECT * FROM ({inner}) AS {sub} WHERE {sub}.{row_number} <= {} \
                     ORDER BY {sub}.{child_key}, {sub}.{row_number};",
                    self.limit
                )]
            }
            GroupedLimitStrategy::Separate => {
                let mut statements = Vec::with_capacity(keys.len());
                for key in &keys {
                    let child = self.child_select(&compiler, &self.key_equals(key), true, None)?;
                    statements.push(format!("{child};"));
                }
                statements
            }
        };

        tracing::debug!(
            dialect = %dialect,
            association = %self.association,
            strategy = ?self.strategy,
            parents = keys.len(),
            "Generating grouped-limit statements"
        );
        for sql in &statements {
            tracing::trace!(sql = %sql, "Generated grouped-limit statement");
        }
        Ok(statements)
    }

    /// Attach child rows to their parents.
    ///
    /// Children are grouped by [`child_key`](Self::child_key) and capped at
    /// the limit whatever strategy produced them; children whose key matches
    /// no parent are dropped. Parents keep their input order. Window rows
    /// carrying a row number are ranked by it before the cap.
    pub fn stitch(&self, parents: Vec<Row>, mut children: Vec<Row>) -> Result<Vec<GroupedRows>> {
        if self.strategy == GroupedLimitStrategy::Window {
            children.sort_by_key(|child| {
                child
                    .get(ROW_NUMBER_ALIAS)
                    .and_then(Value::as_i64)
                    .unwrap_or(i64::MAX)
            });
        }

        let mut buckets: HashMap<ValueKey, Vec<Row>> = HashMap::new();
        for parent in &parents {
            let value = parent.get(&self.parent_key).ok_or_else(|| self.missing_key())?;
            if let Some(key) = value.key().filter(|k| *k != ValueKey::Null) {
                buckets.entry(key).or_default();
            }
        }

        let cap = usize::try_from(self.limit).unwrap_or(usize::MAX);
        for child in children {
            let Some(key) = child.get(&self.child_key).and_then(Value::key) else {
                continue;
            };
            if let Some(bucket) = buckets.get_mut(&key) {
                if bucket.len() < cap {
                    bucket.push(child);
                }
            }
        }

        Ok(parents
            .into_iter()
            .map(|parent| {
                let children = parent
                    .get(&self.parent_key)
                    .and_then(Value::key)
                    .and_then(|key| buckets.get(&key))
                    .cloned()
                    .unwrap_or_default();
                GroupedRows { parent, children }
            })
            .collect())
    }

    fn key_equals(&self, key: &Value) -> Predicate {
        Predicate::eq(self.key_column.column.clone(), key.clone())
    }

    fn child_select(
        &self,
        compiler: &WhereCompiler,
        key: &Predicate,
        limited: bool,
        extra: Option<String>,
    ) -> Result<String> {
        let dialect = self.dialect;
        let mut items = self.columns.clone();
        items.extend(extra);
        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            items.join(", "),
            dialect.quote_identifiers(&self.table),
            dialect.quote_identifier(&self.alias)
        );
        if let Some(join) = &self.through {
            sql.push(' ');
            sql.push_str(&join.to_sql(compiler)?);
        }

        let mut conditions = Vec::with_capacity(2);
        conditions.extend(compiler.compile(key, Some(&self.key_column.qualifier))?);
        conditions.extend(compiler.compile(&self.where_clause, Some(&self.alias))?);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if limited {
            if let Some(order) = order_by(compiler, &self.order, Some(&self.alias)) {
                sql.push_str(" ORDER BY ");
                sql.push_str(&order);
            }
            sql.push_str(&dialect.limit_clause(Some(self.limit), None));
        }
        Ok(sql)
    }

    fn missing_key(&self) -> Error {
        Error::generation(
            GenerationErrorKind::MissingKey,
            format!(
                "parent rows must carry \"{}\" to load \"{}\"",
                self.parent_key, self.association
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmodel_core::{
        AssociationOptions, AssociationRegistry, AttributeDescriptor, DataType, ModelDefinition,
        ModelId,
    };

    fn graph() -> (AssociationGraph, ModelId) {
        let mut registry = AssociationRegistry::default();
        let user = registry.define_model(ModelDefinition::new("User")).unwrap();
        let task = registry
            .define_model(
                ModelDefinition::new("Task")
                    .attribute(AttributeDescriptor::new("title", DataType::String(255))),
            )
            .unwrap();
        let tag = registry.define_model(ModelDefinition::new("Tag")).unwrap();
        registry.has_many(user, task, AssociationOptions::new()).unwrap();
        registry
            .belongs_to_many(user, tag, AssociationOptions::new().through("UserTags"))
            .unwrap();
        (registry.freeze().unwrap(), user)
    }

    fn plan(dialect: Dialect, strategy: GroupedLimitStrategy, include: Include) -> GroupedLimitPlan {
        let (graph, user) = graph();
        let association = graph.require(user, &include.association).unwrap();
        GroupedLimitPlan::new(&graph, association, &include, dialect, strategy).unwrap()
    }

    fn keys() -> Vec<Value> {
        vec![Value::Int(1), Value::Int(2)]
    }

    // ==================== Strategy Tests ====================

    #[test]
    fn test_auto_resolves_per_dialect() {
        let include = Include::new("tasks").limit(2);
        assert_eq!(
            plan(Dialect::Postgres, GroupedLimitStrategy::Auto, include.clone()).strategy,
            GroupedLimitStrategy::Window
        );
        assert_eq!(
            plan(Dialect::Mysql, GroupedLimitStrategy::Auto, include).strategy,
            GroupedLimitStrategy::Union
        );
    }

    #[test]
    fn test_union_statement() {
        let plan = plan(
            Dialect::Sqlite,
            GroupedLimitStrategy::Union,
            Include::new("tasks").limit(2),
        );
        let statements = plan.statements(&keys()).unwrap();
        assert_eq!(
            statements,
            vec![
                "SELECT * FROM (SELECT `tasks`.`id`, `tasks`.`title`, `tasks`.`userId` FROM `Tasks` AS `tasks` WHERE `tasks`.`userId`=1 LIMIT 2) AS `sub` \
                 UNION ALL \
                 SELECT * FROM (SELECT `tasks`.`id`, `tasks`.`title`, `tasks`.`userId` FROM `Tasks` AS `tasks` WHERE `tasks`.`userId`=2 LIMIT 2) AS `sub`;"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_window_statement() {
        let plan = plan(
            Dialect::Postgres,
            GroupedLimitStrategy::Window,
            Include::new("tasks").limit(2).order(OrderItem::desc("id")),
        );
        let statements = plan.statements(&keys()).unwrap();
        assert_eq!(
            statements,
            vec![
                "SELECT * FROM (SELECT \"tasks\".\"id\", \"tasks\".\"title\", \"tasks\".\"userId\", \
                 ROW_NUMBER() OVER (PARTITION BY \"tasks\".\"userId\" ORDER BY \"tasks\".\"id\" DESC) AS \"row_number\" \
                 FROM \"Tasks\" AS \"tasks\" WHERE \"tasks\".\"userId\" IN (1,2)) AS \"sub\" WHERE \"sub\".\"row_number\" <= 2 \
                 ORDER BY \"sub\".\"userId\", \"sub\".\"row_number\";"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_separate_statements() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Separate,
            Include::new("tasks")
                .limit(3)
                .attributes(["title"])
                .where_clause(Predicate::like("title", "a%")),
        );
        let statements = plan.statements(&keys()).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1],
            "SELECT `tasks`.`id`, `tasks`.`title`, `tasks`.`userId` FROM `Tasks` AS `tasks` \
             WHERE `tasks`.`userId`=2 AND `tasks`.`title` LIKE 'a%' LIMIT 3;"
        );
    }

    #[test]
    fn test_duplicate_and_null_keys_are_skipped() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Separate,
            Include::new("tasks").limit(1),
        );
        let statements = plan
            .statements(&[Value::Int(1), Value::Null, Value::Int(1)])
            .unwrap();
        assert_eq!(statements.len(), 1);
        assert!(plan.statements(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_belongs_to_many_exposes_through_key() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Separate,
            Include::new("tags").limit(2),
        );
        assert_eq!(plan.child_key, "UserTags.userId");
        assert_eq!(
            plan.statements(&[Value::Int(7)]).unwrap()[0],
            "SELECT `tags`.`id`, `UserTags`.`userId` AS `UserTags.userId` FROM `Tags` AS `tags` \
             INNER JOIN `UserTags` AS `UserTags` ON `tags`.`id` = `UserTags`.`tagId` \
             WHERE `UserTags`.`userId`=7 LIMIT 2;"
        );
    }

    // ==================== Stitch Tests ====================

    #[test]
    fn test_stitch_caps_each_parent() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Union,
            Include::new("tasks").limit(2),
        );
        let parents: Vec<Row> = (1..=3).map(|id| Row::new().with("id", id)).collect();
        let mut children = Vec::new();
        for user in 1..=3 {
            for n in 0..5 {
                children.push(Row::new().with("id", user * 10 + n).with("userId", user));
            }
        }
        let grouped = plan.stitch(parents, children).unwrap();
        assert_eq!(grouped.len(), 3);
        for (i, group) in grouped.iter().enumerate() {
            assert_eq!(group.parent.get("id"), Some(&Value::Int(i as i64 + 1)));
            assert_eq!(group.children.len(), 2);
        }
        assert_eq!(grouped[2].children[1].get("id"), Some(&Value::Int(31)));
    }

    #[test]
    fn test_window_statement_orders_belongs_to_many_by_through_key() {
        let plan = plan(
            Dialect::Postgres,
            GroupedLimitStrategy::Window,
            Include::new("tags").limit(1),
        );
        let sql = plan.statements(&keys()).unwrap().remove(0);
        assert!(
            sql.ends_with(
                ") AS \"sub\" WHERE \"sub\".\"row_number\" <= 1 \
                 ORDER BY \"sub\".\"UserTags.userId\", \"sub\".\"row_number\";"
            ),
            "{sql}"
        );
    }

    #[test]
    fn test_window_stitch_ranks_interleaved_children() {
        let plan = plan(
            Dialect::Postgres,
            GroupedLimitStrategy::Window,
            Include::new("tasks").limit(2).order(OrderItem::desc("id")),
        );
        let parents: Vec<Row> = (1..=2).map(|id| Row::new().with("id", id)).collect();
        let child = |id: i64, user: i64, rank: i64| {
            Row::new()
                .with("id", id)
                .with("userId", user)
                .with("row_number", rank)
        };
        let children = vec![
            child(13, 1, 3),
            child(22, 2, 2),
            child(14, 1, 2),
            child(23, 2, 1),
            child(15, 1, 1),
        ];
        let grouped = plan.stitch(parents, children).unwrap();
        let ids = |group: &GroupedRows| -> Vec<Option<i64>> {
            group.children.iter().map(|c| c.get("id").and_then(Value::as_i64)).collect()
        };
        assert_eq!(ids(&grouped[0]), vec![Some(15), Some(14)]);
        assert_eq!(ids(&grouped[1]), vec![Some(23), Some(22)]);
    }

    #[test]
    fn test_stitch_keeps_arrival_order_per_parent() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Separate,
            Include::new("tasks").limit(5),
        );
        let parents: Vec<Row> = (1..=2).map(|id| Row::new().with("id", id)).collect();
        let children: Vec<Row> = [(3, 2), (9, 1), (1, 2), (4, 1)]
            .into_iter()
            .map(|(id, user)| Row::new().with("id", id).with("userId", user))
            .collect();
        let grouped = plan.stitch(parents, children).unwrap();
        assert_eq!(grouped[0].children[0].get("id"), Some(&Value::Int(9)));
        assert_eq!(grouped[0].children[1].get("id"), Some(&Value::Int(4)));
        assert_eq!(grouped[1].children[0].get("id"), Some(&Value::Int(3)));
        assert_eq!(grouped[1].children[1].get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_explicit_window_falls_back_without_window_functions() {
        let plan = plan(
            Dialect::Sqlite,
            GroupedLimitStrategy::Window,
            Include::new("tasks").limit(2),
        );
        assert_eq!(plan.strategy, GroupedLimitStrategy::Union);
        let sql = plan.statements(&keys()).unwrap().remove(0);
        assert!(!sql.contains("ROW_NUMBER"), "{sql}");
        assert!(sql.contains(" UNION ALL "), "{sql}");
    }

    #[test]
    fn test_stitch_parent_without_key_is_error() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Union,
            Include::new("tasks").limit(2),
        );
        let err = plan
            .stitch(vec![Row::new().with("name", "a")], Vec::new())
            .unwrap_err();
        assert_eq!(err.generation_kind(), Some(GenerationErrorKind::MissingKey));
    }

    #[test]
    fn test_parent_keys_are_distinct() {
        let plan = plan(
            Dialect::Mysql,
            GroupedLimitStrategy::Union,
            Include::new("tasks").limit(2),
        );
        let parents = vec![
            Row::new().with("id", 2),
            Row::new().with("id", 1),
            Row::new().with("id", 2),
        ];
        assert_eq!(
            plan.parent_keys(&parents).unwrap(),
            vec![Value::Int(2), Value::Int(1)]
        );
    }
}
