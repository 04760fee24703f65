//! Core types for relmodel.
//!
//! This crate provides the foundations shared by query and schema generation:
//!
//! - `Dialect` descriptors: quoting, escaping and capability flags
//! - `ModelDefinition` and the `ModelCatalog` arena
//! - `AssociationRegistry` for declaring associations, frozen into an
//!   immutable `AssociationGraph`
//! - `Value` and `Row` for the data flowing into generated statements

pub mod association;
pub mod attribute;
pub mod config;
pub mod dialect;
pub mod error;
pub mod index;
pub mod inflection;
pub mod model;
pub mod row;
pub mod types;
pub mod value;

pub use association::{
    AccessorNames, AliasOption, Association, AssociationCore, AssociationGraph, AssociationId,
    AssociationKind, AssociationOptions, AssociationRegistry, BelongsTo, BelongsToMany,
    ForeignKeyOptions, HasAssociation, InverseOptions, MultiAccessorNames, NormalizedOptions,
    ThroughAssociations, ThroughModel, ThroughOptions, ThroughUnique,
};
pub use attribute::{AttributeDescriptor, ReferentialAction, References, UniqueKey};
pub use config::{GeneratorOptions, GroupedLimitStrategy};
pub use dialect::{DeleteLimit, Dialect, LimitStyle};
pub use error::{
    AssociationError, AssociationErrorKind, ConfigError, Error, GenerationError,
    GenerationErrorKind, Result, SchemaError, SchemaErrorKind,
};
pub use index::{IndexDefinition, IndexField, IndexType, SortOrder};
pub use model::{ModelCatalog, ModelDefinition, ModelId, ModelName};
pub use row::Row;
pub use types::DataType;
pub use value::{Value, ValueKey};
