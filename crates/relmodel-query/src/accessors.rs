//! Association accessors as capability traits.
//!
//! Each association variant implements the accessors it supports
//! (`Gettable`, `Settable`, `Addable`, `Removable`, `Creatable`, `Countable`,
//! `Checkable`). An accessor takes the frozen graph and the source instance
//! as a [`Row`] and returns [`AccessorStatement`]s, which render to SQL for
//! any dialect.
//!
//! | Variant | get | set | add | remove | create | count | has |
//! |---|---|---|---|---|---|---|---|
//! | [`BelongsTo`] | x | x | | | x | | |
//! | [`HasOne`] | x | x | | | x | | |
//! | [`HasMany`] | x | x | x | x | x | x | x |
//! | [`BelongsToMany`] | x | x | x | x | x | x | x |

use crate::dml::{
    DeleteOptions, InsertOptions, Returning, UpdateOptions, bulk_insert_query, delete_query,
    insert_query, update_query,
};
use crate::join::{ColumnRef, Join, table_ref};
use crate::options::{Attribute, FindOptions};
use crate::select::select_with_joins;
use crate::where_clause::Predicate;
use relmodel_core::{
    Association, AssociationGraph, BelongsTo, BelongsToMany, Dialect, Error, GenerationErrorKind,
    HasAssociation, ModelDefinition, Result, Row, Value,
};

/// A statement produced by an accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessorStatement {
    Select {
        table: String,
        options: FindOptions,
        joins: Vec<Join>,
    },
    Insert {
        table: String,
        rows: Vec<Row>,
        options: InsertOptions,
    },
    Update {
        table: String,
        values: Row,
        where_clause: Predicate,
    },
    Delete {
        table: String,
        where_clause: Predicate,
    },
}

impl AccessorStatement {
    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        match self {
            AccessorStatement::Select {
                table,
                options,
                joins,
            } => select_with_joins(dialect, table, options, joins),
            AccessorStatement::Insert {
                table,
                rows,
                options,
            } => match rows.as_slice() {
                [row] => insert_query(dialect, table, row, false, options),
                rows => bulk_insert_query(dialect, table, rows, options),
            },
            AccessorStatement::Update {
                table,
                values,
                where_clause,
            } => update_query(
                dialect,
                table,
                values,
                where_clause,
                false,
                &UpdateOptions::default(),
            ),
            AccessorStatement::Delete {
                table,
                where_clause,
            } => delete_query(dialect, table, where_clause, &DeleteOptions::default()),
        }
    }
}

/// Fetch the associated instance(s).
pub trait Gettable {
    /// `options` narrows the fetch; its `where` is combined with the
    /// association condition.
    fn get(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        options: FindOptions,
    ) -> Result<AccessorStatement>;
}

/// Replace the associated instance(s).
pub trait Settable {
    /// Single-valued associations link the last target, or unlink when
    /// `targets` is empty.
    fn set(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>>;
}

pub trait Addable {
    fn add(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>>;
}

pub trait Removable {
    fn remove(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>>;
}

/// Insert a new target and link it.
pub trait Creatable {
    /// The INSERT comes first. Linking statements follow when `values`
    /// carries the key they need; otherwise the caller links the inserted
    /// row with [`Settable`] or [`Addable`] once its key is known.
    fn create(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        values: Row,
    ) -> Result<Vec<AccessorStatement>>;
}

pub trait Countable {
    fn count(&self, graph: &AssociationGraph, instance: &Row) -> Result<AccessorStatement>;
}

/// Whether the targets are all associated.
pub trait Checkable {
    /// Selects the keys of the given targets that are associated; all are
    /// when as many rows come back as targets were passed.
    fn has(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<AccessorStatement>;
}

/// HasOne view of a [`HasAssociation`].
#[derive(Debug, Clone, Copy)]
pub struct HasOne<'a>(pub &'a HasAssociation);

/// HasMany view of a [`HasAssociation`].
#[derive(Debug, Clone, Copy)]
pub struct HasMany<'a>(pub &'a HasAssociation);

/// An association with its accessors.
#[derive(Debug, Clone, Copy)]
pub enum Accessors<'a> {
    BelongsTo(&'a BelongsTo),
    HasOne(HasOne<'a>),
    HasMany(HasMany<'a>),
    BelongsToMany(&'a BelongsToMany),
}

impl<'a> From<&'a Association> for Accessors<'a> {
    fn from(association: &'a Association) -> Self {
        match association {
            Association::BelongsTo(a) => Accessors::BelongsTo(a),
            Association::HasOne(a) => Accessors::HasOne(HasOne(a)),
            Association::HasMany(a) => Accessors::HasMany(HasMany(a)),
            Association::BelongsToMany(a) => Accessors::BelongsToMany(a),
        }
    }
}

impl Accessors<'_> {
    pub fn get(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        options: FindOptions,
    ) -> Result<AccessorStatement> {
        match self {
            Accessors::BelongsTo(a) => a.get(graph, instance, options),
            Accessors::HasOne(a) => a.get(graph, instance, options),
            Accessors::HasMany(a) => a.get(graph, instance, options),
            Accessors::BelongsToMany(a) => a.get(graph, instance, options),
        }
    }

    pub fn set(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        match self {
            Accessors::BelongsTo(a) => a.set(graph, instance, targets),
            Accessors::HasOne(a) => a.set(graph, instance, targets),
            Accessors::HasMany(a) => a.set(graph, instance, targets),
            Accessors::BelongsToMany(a) => a.set(graph, instance, targets),
        }
    }

    pub fn create(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        values: Row,
    ) -> Result<Vec<AccessorStatement>> {
        match self {
            Accessors::BelongsTo(a) => a.create(graph, instance, values),
            Accessors::HasOne(a) => a.create(graph, instance, values),
            Accessors::HasMany(a) => a.create(graph, instance, values),
            Accessors::BelongsToMany(a) => a.create(graph, instance, values),
        }
    }
}

// ==================== Helpers ====================

fn required_key(row: &Row, column: &str, purpose: &str) -> Result<Value> {
    match row.get(column) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(Error::generation(
            GenerationErrorKind::MissingKey,
            format!("{purpose} needs \"{column}\" on the instance"),
        )),
    }
}

/// Equality on every primary key column of `model`, taken from `row`.
fn primary_key_predicate(model: &ModelDefinition, row: &Row) -> Result<Predicate> {
    let fields = model.primary_key_fields();
    if fields.is_empty() {
        return Err(Error::generation(
            GenerationErrorKind::MissingPrimaryKey,
            format!("model \"{}\" has no primary key", model.name),
        ));
    }
    let purpose = format!("identifying a {} row", model.name);
    let conditions = fields
        .into_iter()
        .map(|field| Ok(Predicate::eq(field, required_key(row, field, &purpose)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Predicate::and(conditions))
}

fn single_primary_key(model: &ModelDefinition) -> Result<&str> {
    match model.primary_key_fields().as_slice() {
        [field] => Ok(*field),
        _ => Err(Error::generation(
            GenerationErrorKind::MissingPrimaryKey,
            format!(
                "model \"{}\" needs a single-column primary key for this accessor",
                model.name
            ),
        )),
    }
}

fn key_values(rows: &[Row], column: &str, purpose: &str) -> Result<Vec<Value>> {
    rows.iter().map(|row| required_key(row, column, purpose)).collect()
}

/// Narrow `options` to `condition` and default its schema to the model's.
fn scoped(model: &ModelDefinition, condition: Predicate, mut options: FindOptions) -> FindOptions {
    options.where_clause = condition.and_also(options.where_clause);
    if options.schema.is_none() {
        options.schema.clone_from(&model.schema);
    }
    options
}

fn select(model: &ModelDefinition, options: FindOptions) -> AccessorStatement {
    AccessorStatement::Select {
        table: model.table_name.clone(),
        options,
        joins: Vec::new(),
    }
}

fn count_select(model: &ModelDefinition, condition: Predicate) -> AccessorStatement {
    select(
        model,
        scoped(
            model,
            condition,
            FindOptions::new().attributes([Attribute::aliased("count(*)", "count")]),
        ),
    )
}

fn update(model: &ModelDefinition, values: Row, where_clause: Predicate) -> AccessorStatement {
    AccessorStatement::Update {
        table: table_ref(model),
        values,
        where_clause,
    }
}

fn insert(model: &ModelDefinition, rows: Vec<Row>, options: InsertOptions) -> AccessorStatement {
    AccessorStatement::Insert {
        table: table_ref(model),
        rows,
        options,
    }
}

// ==================== BelongsTo ====================

impl Gettable for BelongsTo {
    fn get(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        options: FindOptions,
    ) -> Result<AccessorStatement> {
        let target = graph.model(self.core.target)?;
        let key = required_key(instance, &self.core.foreign_key_field, "getting a BelongsTo target")?;
        let mut options = scoped(target, Predicate::eq(&self.target_key_field, key), options);
        options.limit = Some(1);
        Ok(select(target, options))
    }
}

impl Settable for BelongsTo {
    fn set(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        let source = graph.model(self.core.source)?;
        let key = match targets.last() {
            Some(target) => required_key(target, &self.target_key_field, "linking a BelongsTo target")?,
            None => Value::Null,
        };
        Ok(vec![update(
            source,
            Row::new().with(&self.core.foreign_key_field, key),
            primary_key_predicate(source, instance)?,
        )])
    }
}

impl Creatable for BelongsTo {
    fn create(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        values: Row,
    ) -> Result<Vec<AccessorStatement>> {
        let target = graph.model(self.core.target)?;
        let key = values.get(&self.target_key_field).cloned();
        let mut statements = vec![insert(
            target,
            vec![values],
            InsertOptions::new().returning(Returning::All),
        )];
        if let Some(key) = key.filter(|k| !k.is_null()) {
            let source = graph.model(self.core.source)?;
            statements.push(update(
                source,
                Row::new().with(&self.core.foreign_key_field, key),
                primary_key_predicate(source, instance)?,
            ));
        }
        Ok(statements)
    }
}

// ==================== HasOne ====================

impl Gettable for HasOne<'_> {
    fn get(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        options: FindOptions,
    ) -> Result<AccessorStatement> {
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let key = required_key(instance, &has.source_key_field, "getting a HasOne target")?;
        let mut options = scoped(target, Predicate::eq(&has.core.foreign_key_field, key), options);
        options.limit = Some(1);
        Ok(select(target, options))
    }
}

impl Settable for HasOne<'_> {
    fn set(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let key = required_key(instance, &has.source_key_field, "setting a HasOne target")?;
        let fk = &has.core.foreign_key_field;
        let mut statements = vec![update(
            target,
            Row::new().with(fk, Value::Null),
            Predicate::eq(fk, key.clone()),
        )];
        if let Some(new_target) = targets.last() {
            statements.push(update(
                target,
                Row::new().with(fk, key),
                primary_key_predicate(target, new_target)?,
            ));
        }
        Ok(statements)
    }
}

impl Creatable for HasOne<'_> {
    fn create(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        values: Row,
    ) -> Result<Vec<AccessorStatement>> {
        create_with_foreign_key(self.0, graph, instance, values)
    }
}

fn create_with_foreign_key(
    has: &HasAssociation,
    graph: &AssociationGraph,
    instance: &Row,
    mut values: Row,
) -> Result<Vec<AccessorStatement>> {
    let target = graph.model(has.core.target)?;
    let key = required_key(instance, &has.source_key_field, "creating an associated row")?;
    values.set(&has.core.foreign_key_field, key);
    Ok(vec![insert(
        target,
        vec![values],
        InsertOptions::new().returning(Returning::All),
    )])
}

// ==================== HasMany ====================

impl Gettable for HasMany<'_> {
    fn get(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        options: FindOptions,
    ) -> Result<AccessorStatement> {
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let key = required_key(instance, &has.source_key_field, "getting HasMany targets")?;
        Ok(select(
            target,
            scoped(target, Predicate::eq(&has.core.foreign_key_field, key), options),
        ))
    }
}

impl Settable for HasMany<'_> {
    fn set(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let pk = single_primary_key(target)?;
        let key = required_key(instance, &has.source_key_field, "setting HasMany targets")?;
        let keys = key_values(targets, pk, "setting HasMany targets")?;
        let fk = &has.core.foreign_key_field;

        let mut statements = vec![update(
            target,
            Row::new().with(fk, Value::Null),
            Predicate::eq(fk, key.clone()).and_also(Predicate::not_in(pk, keys.clone())),
        )];
        if !keys.is_empty() {
            statements.push(update(
                target,
                Row::new().with(fk, key),
                Predicate::in_list(pk, keys),
            ));
        }
        Ok(statements)
    }
}

impl Addable for HasMany<'_> {
    fn add(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let pk = single_primary_key(target)?;
        let key = required_key(instance, &has.source_key_field, "adding HasMany targets")?;
        let keys = key_values(targets, pk, "adding HasMany targets")?;
        Ok(vec![update(
            target,
            Row::new().with(&has.core.foreign_key_field, key),
            Predicate::in_list(pk, keys),
        )])
    }
}

impl Removable for HasMany<'_> {
    fn remove(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let pk = single_primary_key(target)?;
        let key = required_key(instance, &has.source_key_field, "removing HasMany targets")?;
        let keys = key_values(targets, pk, "removing HasMany targets")?;
        let fk = &has.core.foreign_key_field;
        Ok(vec![update(
            target,
            Row::new().with(fk, Value::Null),
            Predicate::eq(fk, key).and_also(Predicate::in_list(pk, keys)),
        )])
    }
}

impl Creatable for HasMany<'_> {
    fn create(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        values: Row,
    ) -> Result<Vec<AccessorStatement>> {
        create_with_foreign_key(self.0, graph, instance, values)
    }
}

impl Countable for HasMany<'_> {
    fn count(&self, graph: &AssociationGraph, instance: &Row) -> Result<AccessorStatement> {
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let key = required_key(instance, &has.source_key_field, "counting HasMany targets")?;
        Ok(count_select(
            target,
            Predicate::eq(&has.core.foreign_key_field, key),
        ))
    }
}

impl Checkable for HasMany<'_> {
    fn has(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<AccessorStatement> {
        let has = self.0;
        let target = graph.model(has.core.target)?;
        let pk = single_primary_key(target)?;
        let key = required_key(instance, &has.source_key_field, "checking HasMany targets")?;
        let keys = key_values(targets, pk, "checking HasMany targets")?;
        let condition =
            Predicate::eq(&has.core.foreign_key_field, key).and_also(Predicate::in_list(pk, keys));
        Ok(select(
            target,
            scoped(target, condition, FindOptions::new().attributes([pk])),
        ))
    }
}

// ==================== BelongsToMany ====================

fn source_key(many: &BelongsToMany, instance: &Row, purpose: &str) -> Result<Value> {
    required_key(instance, &many.source_key_field, purpose)
}

/// Junction rows linking `key` to each target key.
fn link_rows(many: &BelongsToMany, key: &Value, target_keys: Vec<Value>) -> Vec<Row> {
    target_keys
        .into_iter()
        .map(|other| {
            Row::new()
                .with(&many.core.foreign_key_field, key.clone())
                .with(&many.other_key_field, other)
        })
        .collect()
}

impl Gettable for BelongsToMany {
    fn get(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        mut options: FindOptions,
    ) -> Result<AccessorStatement> {
        let target = graph.model(self.core.target)?;
        let through = graph.model(self.through)?;
        let key = source_key(self, instance, "getting BelongsToMany targets")?;
        let target_table = table_ref(target);
        let through_table = table_ref(through);

        if options.attributes.is_none() {
            options = options.attributes([format!("{target_table}.*")]);
        }
        let condition = Predicate::eq(format!("{through_table}.{}", self.core.foreign_key_field), key);
        let join = Join::inner(through_table.clone()).on(
            ColumnRef::new(&target_table, &self.target_key_field),
            ColumnRef::new(&through_table, &self.other_key_field),
        );
        Ok(AccessorStatement::Select {
            table: target.table_name.clone(),
            options: scoped(target, condition, options),
            joins: vec![join],
        })
    }
}

impl Settable for BelongsToMany {
    fn set(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        let through = graph.model(self.through)?;
        let key = source_key(self, instance, "setting BelongsToMany targets")?;
        let keys = key_values(targets, &self.target_key_field, "setting BelongsToMany targets")?;

        let mut statements = vec![AccessorStatement::Delete {
            table: table_ref(through),
            where_clause: Predicate::eq(&self.core.foreign_key_field, key.clone())
                .and_also(Predicate::not_in(&self.other_key_field, keys.clone())),
        }];
        if !keys.is_empty() {
            statements.push(insert(
                through,
                link_rows(self, &key, keys),
                InsertOptions::new().ignore_duplicates(true),
            ));
        }
        Ok(statements)
    }
}

impl Addable for BelongsToMany {
    fn add(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let through = graph.model(self.through)?;
        let key = source_key(self, instance, "adding BelongsToMany targets")?;
        let keys = key_values(targets, &self.target_key_field, "adding BelongsToMany targets")?;
        Ok(vec![insert(
            through,
            link_rows(self, &key, keys),
            InsertOptions::new().ignore_duplicates(true),
        )])
    }
}

impl Removable for BelongsToMany {
    fn remove(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<Vec<AccessorStatement>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let through = graph.model(self.through)?;
        let key = source_key(self, instance, "removing BelongsToMany targets")?;
        let keys = key_values(targets, &self.target_key_field, "removing BelongsToMany targets")?;
        Ok(vec![AccessorStatement::Delete {
            table: table_ref(through),
            where_clause: Predicate::eq(&self.core.foreign_key_field, key)
                .and_also(Predicate::in_list(&self.other_key_field, keys)),
        }])
    }
}

impl Creatable for BelongsToMany {
    fn create(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        values: Row,
    ) -> Result<Vec<AccessorStatement>> {
        let target = graph.model(self.core.target)?;
        let key = source_key(self, instance, "creating a BelongsToMany target")?;
        let target_key = values.get(&self.target_key_field).cloned();
        let mut statements = vec![insert(
            target,
            vec![values],
            InsertOptions::new().returning(Returning::All),
        )];
        if let Some(target_key) = target_key.filter(|k| !k.is_null()) {
            let through = graph.model(self.through)?;
            statements.push(insert(
                through,
                link_rows(self, &key, vec![target_key]),
                InsertOptions::new(),
            ));
        }
        Ok(statements)
    }
}

impl Countable for BelongsToMany {
    fn count(&self, graph: &AssociationGraph, instance: &Row) -> Result<AccessorStatement> {
        let through = graph.model(self.through)?;
        let key = source_key(self, instance, "counting BelongsToMany targets")?;
        Ok(count_select(
            through,
            Predicate::eq(&self.core.foreign_key_field, key),
        ))
    }
}

impl Checkable for BelongsToMany {
    fn has(
        &self,
        graph: &AssociationGraph,
        instance: &Row,
        targets: &[Row],
    ) -> Result<AccessorStatement> {
        let through = graph.model(self.through)?;
        let key = source_key(self, instance, "checking BelongsToMany targets")?;
        let keys = key_values(targets, &self.target_key_field, "checking BelongsToMany targets")?;
        let condition = Predicate::eq(&self.core.foreign_key_field, key)
            .and_also(Predicate::in_list(&self.other_key_field, keys));
        Ok(select(
            through,
            scoped(
                through,
                condition,
                FindOptions::new().attributes([self.other_key_field.as_str()]),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmodel_core::{AssociationOptions, AssociationRegistry, ModelId};

    struct Fixture {
        graph: AssociationGraph,
        user: ModelId,
        task: ModelId,
    }

    fn fixture() -> Fixture {
        let mut registry = AssociationRegistry::default();
        let user = registry.define_model(ModelDefinition::new("User")).unwrap();
        let task = registry.define_model(ModelDefinition::new("Task")).unwrap();
        let profile = registry.define_model(ModelDefinition::new("Profile")).unwrap();
        let tag = registry.define_model(ModelDefinition::new("Tag")).unwrap();
        registry.has_many(user, task, AssociationOptions::new()).unwrap();
        registry.has_one(user, profile, AssociationOptions::new()).unwrap();
        registry
            .belongs_to_many(user, tag, AssociationOptions::new().through("UserTags"))
            .unwrap();
        Fixture {
            graph: registry.freeze().unwrap(),
            user,
            task,
        }
    }

    fn accessors<'a>(f: &'a Fixture, model: ModelId, alias: &str) -> Accessors<'a> {
        Accessors::from(f.graph.require(model, alias).unwrap())
    }

    fn sql(statements: &[AccessorStatement], dialect: Dialect) -> Vec<String> {
        statements.iter().map(|s| s.to_sql(dialect).unwrap()).collect()
    }

    fn user_one() -> Row {
        Row::new().with("id", 1)
    }

    // ==================== BelongsTo Tests ====================

    #[test]
    fn test_belongs_to_get() {
        let f = fixture();
        let task = Row::new().with("id", 5).with("userId", 1);
        let statement = accessors(&f, f.task, "user")
            .get(&f.graph, &task, FindOptions::new())
            .unwrap();
        assert_eq!(
            statement.to_sql(Dialect::Mysql).unwrap(),
            "SELECT * FROM `Users` WHERE `Users`.`id`=1 LIMIT 1;"
        );
    }

    #[test]
    fn test_belongs_to_set_and_unset() {
        let f = fixture();
        let task = Row::new().with("id", 5).with("userId", 1);
        let access = accessors(&f, f.task, "user");
        let statements = access
            .set(&f.graph, &task, &[Row::new().with("id", 2)])
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Mysql),
            vec!["UPDATE `Tasks` SET `userId`=2 WHERE `id`=5"]
        );
        let statements = access.set(&f.graph, &task, &[]).unwrap();
        assert_eq!(
            sql(&statements, Dialect::Postgres),
            vec!["UPDATE \"Tasks\" SET \"userId\"=NULL WHERE \"id\"=5"]
        );
    }

    #[test]
    fn test_belongs_to_get_missing_key() {
        let f = fixture();
        let err = accessors(&f, f.task, "user")
            .get(&f.graph, &Row::new().with("id", 5), FindOptions::new())
            .unwrap_err();
        assert_eq!(err.generation_kind(), Some(GenerationErrorKind::MissingKey));
    }

    // ==================== HasOne Tests ====================

    #[test]
    fn test_has_one_set() {
        let f = fixture();
        let statements = accessors(&f, f.user, "profile")
            .set(&f.graph, &user_one(), &[Row::new().with("id", 9)])
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Sqlite),
            vec![
                "UPDATE `Profiles` SET `userId`=NULL WHERE `userId`=1",
                "UPDATE `Profiles` SET `userId`=1 WHERE `id`=9",
            ]
        );
    }

    #[test]
    fn test_has_one_create_sets_foreign_key() {
        let f = fixture();
        let statements = accessors(&f, f.user, "profile")
            .create(&f.graph, &user_one(), Row::new().with("bio", "hi"))
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Postgres),
            vec!["INSERT INTO \"Profiles\" (\"bio\",\"userId\") VALUES ('hi',1) RETURNING *;"]
        );
    }

    // ==================== HasMany Tests ====================

    #[test]
    fn test_has_many_get_with_options() {
        let f = fixture();
        let statement = has_many(&f)
            .get(
                &f.graph,
                &user_one(),
                FindOptions::new().where_clause(Predicate::eq("done", false)),
            )
            .unwrap();
        assert_eq!(
            statement.to_sql(Dialect::Mysql).unwrap(),
            "SELECT * FROM `Tasks` WHERE `Tasks`.`userId`=1 AND `Tasks`.`done`=0;"
        );
    }

    #[test]
    fn test_has_many_set() {
        let f = fixture();
        let targets = [Row::new().with("id", 3), Row::new().with("id", 4)];
        let statements = accessors(&f, f.user, "tasks")
            .set(&f.graph, &user_one(), &targets)
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Mysql),
            vec![
                "UPDATE `Tasks` SET `userId`=NULL WHERE `userId`=1 AND `id` NOT IN (3,4)",
                "UPDATE `Tasks` SET `userId`=1 WHERE `id` IN (3,4)",
            ]
        );
    }

    #[test]
    fn test_has_many_set_empty_unlinks_all() {
        let f = fixture();
        let statements = accessors(&f, f.user, "tasks")
            .set(&f.graph, &user_one(), &[])
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Mysql),
            vec!["UPDATE `Tasks` SET `userId`=NULL WHERE `userId`=1"]
        );
    }

    fn has_many(f: &Fixture) -> HasMany<'_> {
        match accessors(f, f.user, "tasks") {
            Accessors::HasMany(has) => has,
            other => panic!("unexpected accessors {other:?}"),
        }
    }

    #[test]
    fn test_has_many_add_remove() {
        let f = fixture();
        let targets = [Row::new().with("id", 3)];
        let added = has_many(&f).add(&f.graph, &user_one(), &targets).unwrap();
        assert_eq!(
            sql(&added, Dialect::Postgres),
            vec!["UPDATE \"Tasks\" SET \"userId\"=1 WHERE \"id\" IN (3)"]
        );
        let removed = has_many(&f).remove(&f.graph, &user_one(), &targets).unwrap();
        assert_eq!(
            sql(&removed, Dialect::Postgres),
            vec!["UPDATE \"Tasks\" SET \"userId\"=NULL WHERE \"userId\"=1 AND \"id\" IN (3)"]
        );
        assert!(has_many(&f).add(&f.graph, &user_one(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_has_many_count_and_has() {
        let f = fixture();
        let count = has_many(&f).count(&f.graph, &user_one()).unwrap();
        assert_eq!(
            count.to_sql(Dialect::Mysql).unwrap(),
            "SELECT count(*) AS `count` FROM `Tasks` WHERE `Tasks`.`userId`=1;"
        );
        let has = has_many(&f)
            .has(&f.graph, &user_one(), &[Row::new().with("id", 3)])
            .unwrap();
        assert_eq!(
            has.to_sql(Dialect::Mysql).unwrap(),
            "SELECT `id` FROM `Tasks` WHERE `Tasks`.`userId`=1 AND `Tasks`.`id` IN (3);"
        );
    }

    #[test]
    fn test_has_many_target_without_key() {
        let f = fixture();
        let err = has_many(&f)
            .add(&f.graph, &user_one(), &[Row::new().with("title", "x")])
            .unwrap_err();
        assert_eq!(err.generation_kind(), Some(GenerationErrorKind::MissingKey));
    }

    // ==================== BelongsToMany Tests ====================

    fn tags(f: &Fixture) -> &BelongsToMany {
        f.graph
            .require(f.user, "tags")
            .unwrap()
            .as_belongs_to_many()
            .unwrap()
    }

    #[test]
    fn test_belongs_to_many_get_joins_through() {
        let f = fixture();
        let statement = tags(&f).get(&f.graph, &user_one(), FindOptions::new()).unwrap();
        assert_eq!(
            statement.to_sql(Dialect::Mysql).unwrap(),
            "SELECT `Tags`.* FROM `Tags` INNER JOIN `UserTags` ON `Tags`.`id` = `UserTags`.`tagId` \
             WHERE `UserTags`.`userId`=1;"
        );
    }

    #[test]
    fn test_belongs_to_many_set() {
        let f = fixture();
        let targets = [Row::new().with("id", 7), Row::new().with("id", 8)];
        let statements = tags(&f).set(&f.graph, &user_one(), &targets).unwrap();
        assert_eq!(
            sql(&statements, Dialect::Sqlite),
            vec![
                "DELETE FROM `UserTags` WHERE `userId`=1 AND `tagId` NOT IN (7,8)",
                "INSERT OR IGNORE INTO `UserTags` (`userId`,`tagId`) VALUES (1,7),(1,8);",
            ]
        );
    }

    #[test]
    fn test_belongs_to_many_add_single_uses_plain_insert() {
        let f = fixture();
        let statements = tags(&f)
            .add(&f.graph, &user_one(), &[Row::new().with("id", 7)])
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Postgres),
            vec!["INSERT INTO \"UserTags\" (\"userId\",\"tagId\") VALUES (1,7) ON CONFLICT DO NOTHING;"]
        );
    }

    #[test]
    fn test_belongs_to_many_remove_count_has() {
        let f = fixture();
        let targets = [Row::new().with("id", 7)];
        assert_eq!(
            sql(&tags(&f).remove(&f.graph, &user_one(), &targets).unwrap(), Dialect::Mysql),
            vec!["DELETE FROM `UserTags` WHERE `userId`=1 AND `tagId` IN (7)"]
        );
        assert_eq!(
            tags(&f).count(&f.graph, &user_one()).unwrap().to_sql(Dialect::Mysql).unwrap(),
            "SELECT count(*) AS `count` FROM `UserTags` WHERE `UserTags`.`userId`=1;"
        );
        assert_eq!(
            tags(&f)
                .has(&f.graph, &user_one(), &targets)
                .unwrap()
                .to_sql(Dialect::Mysql)
                .unwrap(),
            "SELECT `tagId` FROM `UserTags` WHERE `UserTags`.`userId`=1 AND `UserTags`.`tagId` IN (7);"
        );
    }

    #[test]
    fn test_belongs_to_many_create_links_known_key() {
        let f = fixture();
        let statements = tags(&f)
            .create(&f.graph, &user_one(), Row::new().with("id", 7).with("name", "x"))
            .unwrap();
        assert_eq!(
            sql(&statements, Dialect::Mysql),
            vec![
                "INSERT INTO `Tags` (`id`,`name`) VALUES (7,'x');",
                "INSERT INTO `UserTags` (`userId`,`tagId`) VALUES (1,7);",
            ]
        );
    }
}
