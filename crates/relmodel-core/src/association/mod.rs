//! Associations between models.
//!
//! An [`Association`] is a tagged variant over the four relationship kinds.
//! Associations live in an arena owned by the [`AssociationRegistry`] while
//! models are being defined, and in the immutable [`AssociationGraph`]
//! afterwards. They refer to models by [`ModelId`] and to each other by
//! [`AssociationId`].

mod graph;
mod options;
mod registry;

pub use graph::AssociationGraph;
pub use options::{
    AliasOption, AssociationKind, AssociationOptions, ForeignKeyOptions, InverseOptions,
    NormalizedOptions, ThroughAssociations, ThroughModel, ThroughOptions, ThroughUnique,
};
pub use registry::AssociationRegistry;

use crate::inflection::upper_first;
use crate::model::{ModelId, ModelName};
use std::fmt;

/// Handle to an association inside a registry or graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationId(pub(crate) usize);

impl AssociationId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Fields shared by every association variant.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationCore {
    pub id: AssociationId,
    pub source: ModelId,
    pub target: ModelId,
    /// Foreign key attribute name. On the source for BelongsTo, on the target
    /// for HasOne/HasMany, on the through model for BelongsToMany.
    pub foreign_key: String,
    /// Column name of the foreign key
    pub foreign_key_field: String,
    pub is_self_association: bool,
    /// Association whose definition created this one
    pub parent: Option<AssociationId>,
    pub options: NormalizedOptions,
}

/// Foreign key on the source, referencing `target_key` on the target.
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsTo {
    pub core: AssociationCore,
    pub target_key: String,
    pub target_key_field: String,
    /// HasOne/HasMany created from the `inverse` option
    pub inverse: Option<AssociationId>,
}

/// Foreign key on the target referencing `source_key` on the source.
/// Shared shape of HasOne and HasMany.
#[derive(Debug, Clone, PartialEq)]
pub struct HasAssociation {
    pub core: AssociationCore,
    pub source_key: String,
    pub source_key_field: String,
    /// The BelongsTo on the target that owns the foreign key
    pub inverse: AssociationId,
}

/// Many-to-many through a junction model.
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsToMany {
    pub core: AssociationCore,
    pub source_key: String,
    pub source_key_field: String,
    pub target_key: String,
    pub target_key_field: String,
    /// Foreign key on the through model pointing at the target
    pub other_key: String,
    pub other_key_field: String,
    pub through: ModelId,
    pub through_unique: ThroughUnique,
    /// The inverse BelongsToMany from target to source
    pub paired: AssociationId,
    /// HasMany source -> through
    pub from_source_to_through: AssociationId,
    /// HasOne source -> through
    pub from_source_to_through_one: AssociationId,
}

/// A resolved association.
#[derive(Debug, Clone, PartialEq)]
pub enum Association {
    BelongsTo(BelongsTo),
    HasOne(HasAssociation),
    HasMany(HasAssociation),
    BelongsToMany(BelongsToMany),
}

/// Method names an instance API would expose for an association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorNames {
    pub get: String,
    pub set: String,
    pub create: String,
    /// Present for HasMany and BelongsToMany
    pub multi: Option<MultiAccessorNames>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiAccessorNames {
    pub add: String,
    pub add_multiple: String,
    pub remove: String,
    pub remove_multiple: String,
    pub has_single: String,
    pub has_all: String,
    pub count: String,
}

impl Association {
    pub fn core(&self) -> &AssociationCore {
        match self {
            Association::BelongsTo(a) => &a.core,
            Association::HasOne(a) | Association::HasMany(a) => &a.core,
            Association::BelongsToMany(a) => &a.core,
        }
    }

    pub fn kind(&self) -> AssociationKind {
        match self {
            Association::BelongsTo(_) => AssociationKind::BelongsTo,
            Association::HasOne(_) => AssociationKind::HasOne,
            Association::HasMany(_) => AssociationKind::HasMany,
            Association::BelongsToMany(_) => AssociationKind::BelongsToMany,
        }
    }

    pub fn id(&self) -> AssociationId {
        self.core().id
    }

    pub fn alias(&self) -> &str {
        &self.core().options.alias
    }

    pub fn name(&self) -> &ModelName {
        &self.core().options.name
    }

    pub fn source(&self) -> ModelId {
        self.core().source
    }

    pub fn target(&self) -> ModelId {
        self.core().target
    }

    pub fn foreign_key(&self) -> &str {
        &self.core().foreign_key
    }

    pub fn parent(&self) -> Option<AssociationId> {
        self.core().parent
    }

    pub fn is_self_association(&self) -> bool {
        self.core().is_self_association
    }

    pub fn is_multi(&self) -> bool {
        self.kind().is_multi()
    }

    pub fn options(&self) -> &NormalizedOptions {
        &self.core().options
    }

    /// The paired or inverse association, if any.
    pub fn inverse(&self) -> Option<AssociationId> {
        match self {
            Association::BelongsTo(a) => a.inverse,
            Association::HasOne(a) | Association::HasMany(a) => Some(a.inverse),
            Association::BelongsToMany(a) => Some(a.paired),
        }
    }

    pub fn as_belongs_to(&self) -> Option<&BelongsTo> {
        match self {
            Association::BelongsTo(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_has(&self) -> Option<&HasAssociation> {
        match self {
            Association::HasOne(a) | Association::HasMany(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_belongs_to_many(&self) -> Option<&BelongsToMany> {
        match self {
            Association::BelongsToMany(a) => Some(a),
            _ => None,
        }
    }

    /// Accessor method names, e.g. `getTasks`/`addTask` for a `tasks` alias.
    pub fn accessor_names(&self) -> AccessorNames {
        let singular = upper_first(&self.name().singular);
        let plural = upper_first(&self.name().plural);
        if self.is_multi() {
            AccessorNames {
                get: format!("get{plural}"),
                set: format!("set{plural}"),
                create: format!("create{singular}"),
                multi: Some(MultiAccessorNames {
                    add: format!("add{singular}"),
                    add_multiple: format!("add{plural}"),
                    remove: format!("remove{singular}"),
                    remove_multiple: format!("remove{plural}"),
                    has_single: format!("has{singular}"),
                    has_all: format!("has{plural}"),
                    count: format!("count{plural}"),
                }),
            }
        } else {
            AccessorNames {
                get: format!("get{singular}"),
                set: format!("set{singular}"),
                create: format!("create{singular}"),
                multi: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;

    fn has_many_tasks() -> Association {
        let options = NormalizedOptions::normalize(
            AssociationKind::HasMany,
            AssociationOptions::new(),
            &ModelDefinition::new("Task"),
        );
        Association::HasMany(HasAssociation {
            core: AssociationCore {
                id: AssociationId(1),
                source: ModelId(0),
                target: ModelId(1),
                foreign_key: "userId".into(),
                foreign_key_field: "userId".into(),
                is_self_association: false,
                parent: None,
                options,
            },
            source_key: "id".into(),
            source_key_field: "id".into(),
            inverse: AssociationId(0),
        })
    }

    #[test]
    fn test_multi_accessor_names() {
        let names = has_many_tasks().accessor_names();
        assert_eq!(names.get, "getTasks");
        assert_eq!(names.create, "createTask");
        let multi = names.multi.unwrap();
        assert_eq!(multi.add, "addTask");
        assert_eq!(multi.add_multiple, "addTasks");
        assert_eq!(multi.has_single, "hasTask");
        assert_eq!(multi.count, "countTasks");
    }

    #[test]
    fn test_variant_accessors() {
        let assoc = has_many_tasks();
        assert_eq!(assoc.kind(), AssociationKind::HasMany);
        assert_eq!(assoc.alias(), "tasks");
        assert_eq!(assoc.inverse(), Some(AssociationId(0)));
        assert!(assoc.as_has().is_some());
        assert!(assoc.as_belongs_to().is_none());
    }
}
