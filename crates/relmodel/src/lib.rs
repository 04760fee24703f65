//! relmodel: relational model metadata to dialect-correct SQL.
//!
//! relmodel resolves association declarations (one-to-one, one-to-many,
//! many-to-many) into foreign keys, inverse associations and junction
//! models, and generates SQL for MySQL, PostgreSQL and SQLite from
//! structured query options.
//!
//! # Quick Start
//!
//! ```ignore
//! use relmodel::prelude::*;
//!
//! let mut registry = AssociationRegistry::default();
//! let user = registry.define_model(
//!     ModelDefinition::new("User")
//!         .attribute(AttributeDescriptor::new("name", DataType::String(255))),
//! )?;
//! let task = registry.define_model(ModelDefinition::new("Task"))?;
//! registry.has_many(user, task, AssociationOptions::new())?;
//! let graph = registry.freeze()?;
//!
//! // Schema
//! let generator = generator_for_dialect(Dialect::Postgres, GeneratorOptions::default());
//! for (_, model) in graph.catalog().iter() {
//!     println!("{}", generator.create_table(model)?);
//! }
//!
//! // Eager loading
//! let query = generator.find(
//!     &graph,
//!     user,
//!     &FindOptions::new().include(Include::new("tasks")),
//! )?;
//! ```
//!
//! # Crates
//!
//! - `relmodel-core`: dialects, catalog, association registry, errors
//! - `relmodel-query`: where-clause compiler, join planner, DML, accessors
//! - `relmodel-schema`: per-dialect query generators and DDL

pub use relmodel_core::{
    AccessorNames, AliasOption, Association, AssociationCore, AssociationError,
    AssociationErrorKind, AssociationGraph, AssociationId, AssociationKind, AssociationOptions,
    AssociationRegistry, AttributeDescriptor, BelongsTo, BelongsToMany, ConfigError, DataType,
    DeleteLimit, Dialect, Error, ForeignKeyOptions, GenerationError, GenerationErrorKind,
    GeneratorOptions, GroupedLimitStrategy, HasAssociation, IndexDefinition, IndexField,
    IndexType, InverseOptions, LimitStyle, ModelCatalog, ModelDefinition, ModelId, ModelName,
    MultiAccessorNames, NormalizedOptions, ReferentialAction, References, Result, Row,
    SchemaError, SchemaErrorKind, SortOrder, ThroughAssociations, ThroughModel, ThroughOptions,
    ThroughUnique, UniqueKey, Value, ValueKey,
};

pub use relmodel_query::{
    AccessorStatement, Accessors, Addable, AliasedColumn, Attribute, Checkable, ColumnRef,
    Condition, Countable, Creatable, DeleteOptions, FindOptions, FindQuery, Gettable, GroupItem,
    GroupedLimitPlan, GroupedRows, HasMany, HasOne, Include, InsertOptions, Join, JoinPlan,
    JoinPlanner, JoinType, Op, OrderItem, Predicate, Removable, Returning, Settable,
    TruncateOptions, UpdateOptions, WhereCompiler, bulk_insert_query, delete_query, find_query,
    insert_query, select_query, select_with_joins, truncate_query, update_query,
};

pub use relmodel_schema::{
    ColumnContext, DropTableOptions, IndexTarget, MysqlQueryGenerator, PostgresQueryGenerator,
    QueryGenerator, SqliteQueryGenerator, add_index_query, generator_for_dialect, index_name,
    remove_index_query, show_indexes_query,
};

/// Sub-crates, for items not re-exported at the top level.
pub use relmodel_core as core;
pub use relmodel_query as query;
pub use relmodel_schema as schema;

/// Prelude for common imports.
///
/// ```ignore
/// use relmodel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Accessors
        AccessorStatement,
        Accessors,
        Addable,
        // Associations
        AssociationGraph,
        AssociationOptions,
        AssociationRegistry,
        // Catalog
        AttributeDescriptor,
        Checkable,
        Countable,
        Creatable,
        DataType,
        // Dialects and configuration
        Dialect,
        DropTableOptions,
        Error,
        // Queries
        FindOptions,
        Gettable,
        GeneratorOptions,
        GroupedLimitStrategy,
        Include,
        IndexDefinition,
        InsertOptions,
        ModelDefinition,
        ModelId,
        OrderItem,
        Predicate,
        // Generators
        QueryGenerator,
        Removable,
        Result,
        Row,
        Settable,
        Value,
        generator_for_dialect,
    };
}
