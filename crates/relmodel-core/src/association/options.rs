//! Association declaration options.
//!
//! [`AssociationOptions`] is what callers pass when declaring an association.
//! The registry normalizes it into [`NormalizedOptions`] (alias resolved,
//! through model located) and compares normalized options structurally to
//! decide whether a redeclaration is compatible.

use crate::attribute::ReferentialAction;
use crate::inflection::{lower_first, pluralize, singularize};
use crate::model::{ModelDefinition, ModelId, ModelName};
use std::fmt;

/// The four association variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

impl AssociationKind {
    /// Whether the association points at many target rows.
    pub const fn is_multi(self) -> bool {
        matches!(self, AssociationKind::HasMany | AssociationKind::BelongsToMany)
    }

    pub const fn name(self) -> &'static str {
        match self {
            AssociationKind::BelongsTo => "BelongsTo",
            AssociationKind::HasOne => "HasOne",
            AssociationKind::HasMany => "HasMany",
            AssociationKind::BelongsToMany => "BelongsToMany",
        }
    }

    /// Declaration method name, e.g. `belongsToMany`.
    pub fn method_name(self) -> String {
        lower_first(self.name())
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The `as` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasOption {
    /// One name; the other grammatical number is inflected from it
    Name(String),
    /// Both numbers given explicitly
    Explicit { singular: String, plural: String },
}

impl From<&str> for AliasOption {
    fn from(name: &str) -> Self {
        AliasOption::Name(name.to_string())
    }
}

impl From<String> for AliasOption {
    fn from(name: String) -> Self {
        AliasOption::Name(name)
    }
}

impl AliasOption {
    /// The alias this option yields for an association kind.
    pub fn alias_for(&self, kind: AssociationKind) -> &str {
        match self {
            AliasOption::Name(name) => name,
            AliasOption::Explicit { singular, plural } => {
                if kind.is_multi() {
                    plural
                } else {
                    singular
                }
            }
        }
    }
}

/// Options of the synthesized foreign key attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyOptions {
    /// Attribute name; inferred when absent
    pub name: Option<String>,
    pub allow_null: Option<bool>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn allow_null(mut self, allow: bool) -> Self {
        self.allow_null = Some(allow);
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

impl From<&str> for ForeignKeyOptions {
    fn from(name: &str) -> Self {
        ForeignKeyOptions::named(name)
    }
}

impl From<String> for ForeignKeyOptions {
    fn from(name: String) -> Self {
        ForeignKeyOptions::named(name)
    }
}

/// The `inverse` option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InverseOptions {
    pub alias: Option<String>,
    /// Kind of the inverse of a BelongsTo: `HasOne` or `HasMany`
    pub kind: Option<AssociationKind>,
    pub foreign_key_constraints: Option<bool>,
}

impl InverseOptions {
    pub fn alias(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: AssociationKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Junction model reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThroughModel {
    /// Looked up by name, created when missing
    Name(String),
    Id(ModelId),
}

impl From<&str> for ThroughModel {
    fn from(name: &str) -> Self {
        ThroughModel::Name(name.to_string())
    }
}

impl From<ModelId> for ThroughModel {
    fn from(id: ModelId) -> Self {
        ThroughModel::Id(id)
    }
}

/// Uniqueness of the through model's foreign key pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ThroughUnique {
    /// Unique key named `<table>_<fk>_<fk>_unique`
    #[default]
    Default,
    /// No unique key
    Disabled,
    /// Unique key with this name
    Named(String),
}

/// The `through` option of BelongsToMany.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughOptions {
    pub model: ThroughModel,
    pub unique: ThroughUnique,
}

impl ThroughOptions {
    pub fn new(model: impl Into<ThroughModel>) -> Self {
        Self {
            model: model.into(),
            unique: ThroughUnique::Default,
        }
    }

    pub fn unique(mut self, unique: ThroughUnique) -> Self {
        self.unique = unique;
        self
    }
}

impl From<&str> for ThroughOptions {
    fn from(name: &str) -> Self {
        ThroughOptions::new(name)
    }
}

impl From<ModelId> for ThroughOptions {
    fn from(id: ModelId) -> Self {
        ThroughOptions::new(id)
    }
}

/// Explicit aliases for the internal legs of a BelongsToMany.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThroughAssociations {
    /// Source -> through (HasMany)
    pub from_source: Option<String>,
    /// Through -> source (BelongsTo)
    pub to_source: Option<String>,
    /// Target -> through (HasMany)
    pub from_target: Option<String>,
    /// Through -> target (BelongsTo)
    pub to_target: Option<String>,
}

impl ThroughAssociations {
    /// The same legs seen from the paired association.
    pub fn swapped(&self) -> Self {
        Self {
            from_source: self.from_target.clone(),
            to_source: self.to_target.clone(),
            from_target: self.from_source.clone(),
            to_target: self.to_source.clone(),
        }
    }
}

/// Options passed when declaring an association.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationOptions {
    pub alias: Option<AliasOption>,
    pub foreign_key: ForeignKeyOptions,
    pub source_key: Option<String>,
    pub target_key: Option<String>,
    /// BelongsToMany: foreign key on the through model pointing at the target
    pub other_key: ForeignKeyOptions,
    pub through: Option<ThroughOptions>,
    pub foreign_key_constraints: Option<bool>,
    pub through_associations: ThroughAssociations,
    pub inverse: Option<InverseOptions>,
}

impl AssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `as` alias.
    pub fn alias(mut self, alias: impl Into<AliasOption>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn alias_explicit(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.alias = Some(AliasOption::Explicit {
            singular: singular.into(),
            plural: plural.into(),
        });
        self
    }

    pub fn foreign_key(mut self, fk: impl Into<ForeignKeyOptions>) -> Self {
        self.foreign_key = fk.into();
        self
    }

    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    pub fn target_key(mut self, key: impl Into<String>) -> Self {
        self.target_key = Some(key.into());
        self
    }

    pub fn other_key(mut self, fk: impl Into<ForeignKeyOptions>) -> Self {
        self.other_key = fk.into();
        self
    }

    pub fn through(mut self, through: impl Into<ThroughOptions>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn foreign_key_constraints(mut self, enabled: bool) -> Self {
        self.foreign_key_constraints = Some(enabled);
        self
    }

    pub fn through_associations(mut self, legs: ThroughAssociations) -> Self {
        self.through_associations = legs;
        self
    }

    /// Set the inverse alias.
    pub fn inverse(mut self, alias: impl Into<String>) -> Self {
        let mut inverse = self.inverse.take().unwrap_or_default();
        inverse.alias = Some(alias.into());
        self.inverse = Some(inverse);
        self
    }

    /// Set the inverse kind (BelongsTo only).
    pub fn inverse_kind(mut self, kind: AssociationKind) -> Self {
        let mut inverse = self.inverse.take().unwrap_or_default();
        inverse.kind = Some(kind);
        self.inverse = Some(inverse);
        self
    }

    pub fn inverse_options(mut self, inverse: InverseOptions) -> Self {
        self.inverse = Some(inverse);
        self
    }

    /// The explicit alias string, if any, for this kind.
    pub(crate) fn alias_str(&self, kind: AssociationKind) -> Option<&str> {
        self.alias.as_ref().map(|a| a.alias_for(kind))
    }

    pub(crate) fn inverse_alias(&self) -> Option<&str> {
        self.inverse.as_ref().and_then(|i| i.alias.as_deref())
    }
}

/// Options after alias resolution; stored on every association.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOptions {
    /// The resolved `as`
    pub alias: String,
    pub name: ModelName,
    /// Whether `as` was given explicitly
    pub is_aliased: bool,
    pub foreign_key: ForeignKeyOptions,
    pub source_key: Option<String>,
    pub target_key: Option<String>,
    pub other_key: ForeignKeyOptions,
    /// Through model, always resolved to an id
    pub through: Option<ThroughOptions>,
    pub foreign_key_constraints: Option<bool>,
    pub through_associations: ThroughAssociations,
    pub inverse: Option<InverseOptions>,
}

impl NormalizedOptions {
    /// Resolve the alias and display names of an association to `target`.
    pub fn normalize(
        kind: AssociationKind,
        options: AssociationOptions,
        target: &ModelDefinition,
    ) -> Self {
        let multi = kind.is_multi();
        let is_aliased = options.alias.is_some();
        let (alias, name) = match options.alias {
            Some(AliasOption::Explicit { singular, plural }) => {
                let alias = if multi { plural.clone() } else { singular.clone() };
                (alias, ModelName { singular, plural })
            }
            Some(AliasOption::Name(alias)) => {
                let name = ModelName {
                    plural: if multi { alias.clone() } else { pluralize(&alias) },
                    singular: if multi { singularize(&alias) } else { alias.clone() },
                };
                (alias, name)
            }
            None => {
                let name = ModelName {
                    singular: lower_first(&target.display_name.singular),
                    plural: lower_first(&target.display_name.plural),
                };
                let alias = if multi {
                    name.plural.clone()
                } else {
                    name.singular.clone()
                };
                (alias, name)
            }
        };

        Self {
            alias,
            name,
            is_aliased,
            foreign_key: options.foreign_key,
            source_key: options.source_key,
            target_key: options.target_key,
            other_key: options.other_key,
            through: options.through,
            foreign_key_constraints: options.foreign_key_constraints,
            through_associations: options.through_associations,
            inverse: options.inverse,
        }
    }

    /// Structural equality ignoring `inverse`.
    pub fn compatible_with(&self, other: &NormalizedOptions) -> bool {
        let NormalizedOptions {
            alias,
            name,
            is_aliased: _,
            foreign_key,
            source_key,
            target_key,
            other_key,
            through,
            foreign_key_constraints,
            through_associations,
            inverse: _,
        } = self;

        *alias == other.alias
            && *name == other.name
            && *foreign_key == other.foreign_key
            && *source_key == other.source_key
            && *target_key == other.target_key
            && *other_key == other.other_key
            && *through == other.through
            && *foreign_key_constraints == other.foreign_key_constraints
            && *through_associations == other.through_associations
    }

    /// Whether foreign key constraints are synthesized.
    pub fn constraints_enabled(&self) -> bool {
        self.foreign_key_constraints != Some(false)
    }
}
