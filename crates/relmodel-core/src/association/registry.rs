//! Build-phase association registry.
//!
//! The registry owns the model catalog while associations are declared.
//! Every declaration synthesizes foreign key attributes on the models it
//! touches, creates the associations it implies (inverse BelongsTo, paired
//! BelongsToMany, through legs) and enforces alias uniqueness per source
//! model. [`AssociationRegistry::freeze`] ends the build phase.

use super::graph::AssociationGraph;
use super::options::{
    AliasOption, AssociationKind, AssociationOptions, ForeignKeyOptions, InverseOptions,
    NormalizedOptions, ThroughModel, ThroughOptions, ThroughUnique,
};
use super::{Association, AssociationCore, AssociationId, BelongsTo, BelongsToMany, HasAssociation};
use crate::attribute::{AttributeDescriptor, ReferentialAction, References, UniqueKey};
use crate::error::{AssociationErrorKind, Error, Result};
use crate::inflection::{camelize, singularize, upper_first};
use crate::model::{ModelCatalog, ModelDefinition, ModelId, ModelName};
use crate::types::DataType;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Association whose definition is creating a child association.
#[derive(Debug, Clone)]
struct ParentRef {
    id: AssociationId,
    alias: String,
}

/// The half of a BelongsToMany pair that is still being constructed.
#[derive(Debug, Clone)]
struct PairInfo {
    id: AssociationId,
    name: ModelName,
}

/// A declaration by model name, resolved once every model exists.
#[derive(Debug, Clone)]
struct PendingDeclaration {
    source: String,
    target: String,
    kind: AssociationKind,
    options: AssociationOptions,
}

enum Prepared {
    Existing(AssociationId),
    New(NormalizedOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Incompatibility {
    DifferentTypes,
    DifferentTargets,
    DifferentOptions,
}

/// Mutable association arena used during model definition.
#[derive(Debug, Default)]
pub struct AssociationRegistry {
    catalog: ModelCatalog,
    /// `None` while an association is under construction
    slots: Vec<Option<Association>>,
    by_source: HashMap<ModelId, IndexMap<String, AssociationId>>,
    pending: Vec<PendingDeclaration>,
}

impl AssociationRegistry {
    /// Start a build phase over an existing catalog.
    pub fn new(catalog: ModelCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Register another model during the build phase.
    pub fn define_model(&mut self, model: ModelDefinition) -> Result<ModelId> {
        self.catalog.define(model)
    }

    pub fn association(&self, id: AssociationId) -> Option<&Association> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Association declared on `source` under `alias`.
    pub fn get(&self, source: ModelId, alias: &str) -> Option<&Association> {
        self.by_source
            .get(&source)
            .and_then(|m| m.get(alias))
            .and_then(|id| self.association(*id))
    }

    /// Associations declared on `source`, in declaration order.
    pub fn associations_of(&self, source: ModelId) -> impl Iterator<Item = &Association> {
        self.by_source
            .get(&source)
            .into_iter()
            .flat_map(|m| m.values())
            .filter_map(|id| self.association(*id))
    }

    // ==================== Declaration API ====================

    /// Define an association between two registered models immediately.
    pub fn define(
        &mut self,
        source: ModelId,
        target: ModelId,
        kind: AssociationKind,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        match kind {
            AssociationKind::BelongsTo => self.define_belongs_to(source, target, options, None),
            AssociationKind::HasOne | AssociationKind::HasMany => {
                self.define_has(kind, source, target, options, None, None)
            }
            AssociationKind::BelongsToMany => {
                // may create the through model and several legs before failing
                let checkpoint = (self.catalog.clone(), self.slots.clone(), self.by_source.clone());
                let result = self.define_belongs_to_many(source, target, options, None, None);
                if result.is_err() {
                    tracing::debug!(
                        source = %self.model_name(source),
                        target = %self.model_name(target),
                        "Rolling back failed belongsToMany"
                    );
                    (self.catalog, self.slots, self.by_source) = checkpoint;
                }
                result
            }
        }
    }

    pub fn belongs_to(
        &mut self,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        self.define(source, target, AssociationKind::BelongsTo, options)
    }

    pub fn has_one(
        &mut self,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        self.define(source, target, AssociationKind::HasOne, options)
    }

    pub fn has_many(
        &mut self,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        self.define(source, target, AssociationKind::HasMany, options)
    }

    pub fn belongs_to_many(
        &mut self,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        self.define(source, target, AssociationKind::BelongsToMany, options)
    }

    /// Queue a declaration between models referenced by name. Neither model
    /// needs to exist yet; see [`resolve`](Self::resolve).
    pub fn declare(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: AssociationKind,
        options: AssociationOptions,
    ) {
        self.pending.push(PendingDeclaration {
            source: source.into(),
            target: target.into(),
            kind,
            options,
        });
    }

    /// Define every queued declaration, in declaration order.
    pub fn resolve(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for decl in pending {
            let alias = decl.options.alias_str(decl.kind).map(str::to_string);
            let lookup = |name: &str| {
                self.catalog.id_of(name).ok_or_else(|| {
                    Error::association(
                        AssociationErrorKind::UnresolvedModel,
                        decl.source.clone(),
                        alias.as_deref(),
                        format!(
                            "{} from \"{}\" to \"{}\" references model \"{}\", which was never defined",
                            decl.kind.method_name(),
                            decl.source,
                            decl.target,
                            name
                        ),
                    )
                })
            };
            let source = lookup(&decl.source)?;
            let target = lookup(&decl.target)?;
            self.define(source, target, decl.kind, decl.options)?;
        }
        Ok(())
    }

    /// Resolve queued declarations and end the build phase.
    pub fn freeze(mut self) -> Result<AssociationGraph> {
        self.resolve()?;
        tracing::debug!(
            models = self.catalog.len(),
            associations = self.slots.iter().flatten().count(),
            "Freezing association graph"
        );
        Ok(AssociationGraph::new(self.catalog, self.slots, self.by_source))
    }

    // ==================== Shared steps ====================

    fn reserve(&mut self) -> AssociationId {
        self.slots.push(None);
        AssociationId(self.slots.len() - 1)
    }

    fn fill(&mut self, association: Association) {
        let id = association.id();
        self.by_source
            .entry(association.source())
            .or_default()
            .insert(association.alias().to_string(), id);
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = Some(association);
        }
    }

    fn slot_mut(&mut self, id: AssociationId) -> Option<&mut Association> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    fn model_name(&self, id: ModelId) -> String {
        self.catalog
            .get(id)
            .map_or_else(|| id.to_string(), |m| m.name.clone())
    }

    /// Normalize options, reject naming collisions and return a compatible
    /// existing association when there is one.
    fn prepare(
        &self,
        kind: AssociationKind,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
        parent: Option<&ParentRef>,
    ) -> Result<Prepared> {
        let source_def = self.catalog.model(source)?;
        let target_def = self.catalog.model(target)?;
        let normalized = NormalizedOptions::normalize(kind, options, target_def);

        tracing::debug!(
            kind = %kind,
            source = %source_def.name,
            target = %target_def.name,
            alias = %normalized.alias,
            parent = parent.map(|p| p.alias.as_str()),
            "Defining association"
        );

        if source_def.has_attribute(&normalized.alias) {
            return Err(Error::association(
                AssociationErrorKind::NamingCollision,
                &source_def.name,
                Some(&normalized.alias),
                format!(
                    "Naming collision between attribute '{0}' and association '{0}' on model {1}. \
                     To remedy this, change the \"as\" options in your association definition",
                    normalized.alias, source_def.name
                ),
            ));
        }

        match self.assert_unique(kind, source, target, &normalized, parent)? {
            Some(existing) => Ok(Prepared::Existing(existing)),
            None => Ok(Prepared::New(normalized)),
        }
    }

    fn root_of(&self, id: AssociationId) -> AssociationId {
        let mut current = id;
        while let Some(parent) = self.association(current).and_then(Association::parent) {
            if self.association(parent).is_none() {
                break;
            }
            current = parent;
        }
        current
    }

    /// An existing association under the same alias is reused when
    /// compatible; anything else is an alias conflict.
    fn assert_unique(
        &self,
        kind: AssociationKind,
        source: ModelId,
        target: ModelId,
        options: &NormalizedOptions,
        parent: Option<&ParentRef>,
    ) -> Result<Option<AssociationId>> {
        let Some(existing) = self.get(source, &options.alias) else {
            return Ok(None);
        };

        let status = if existing.kind() != kind {
            Some(Incompatibility::DifferentTypes)
        } else if existing.target() != target {
            Some(Incompatibility::DifferentTargets)
        } else if !existing.options().compatible_with(options) {
            Some(Incompatibility::DifferentOptions)
        } else {
            None
        };

        if status.is_none() {
            tracing::trace!(alias = %options.alias, "Reusing compatible association");
            return Ok(Some(existing.id()));
        }

        let source_name = self.model_name(source);
        let root_id = self.root_of(existing.id());
        if parent.is_none() && root_id == existing.id() {
            return Err(Error::association(
                AssociationErrorKind::AliasConflict,
                &source_name,
                Some(&options.alias),
                format!(
                    "You have defined two associations with the same name \"{}\" on the model \"{}\". \
                     Use another alias using the \"as\" parameter.",
                    options.alias, source_name
                ),
            ));
        }

        let target_name = self.model_name(target);
        let prefix = match parent {
            Some(p) => format!("The association \"{}\" needs to define", p.alias),
            None => "You are trying to define".to_string(),
        };
        let reason = match status {
            Some(Incompatibility::DifferentTypes) => format!(
                "their types are different ({} vs {})",
                kind,
                existing.kind()
            ),
            Some(Incompatibility::DifferentTargets) => format!(
                "they target different models ({} vs {})",
                target_name,
                self.model_name(existing.target())
            ),
            _ => "their options are not reconcilable".to_string(),
        };
        let declared_by = self.association(root_id).map_or_else(String::new, |root| {
            format!(
                "{}.{}({}, as: \"{}\")",
                self.model_name(root.source()),
                root.kind().method_name(),
                self.model_name(root.target()),
                root.alias()
            )
        });

        Err(Error::association(
            AssociationErrorKind::AliasConflict,
            &source_name,
            Some(&options.alias),
            format!(
                "{prefix} the {kind} association \"{}\" from {source_name} to {target_name}, \
                 but that child association has already been defined as {}, to {} by this call: \
                 {declared_by}. That association would be re-used if compatible, but it is \
                 incompatible because {reason}",
                options.alias,
                existing.kind(),
                self.model_name(existing.target()),
            ),
        ))
    }

    fn self_association_error(
        &self,
        kind: AssociationKind,
        source: ModelId,
        alias: Option<&str>,
        extra: &str,
    ) -> Error {
        Error::association(
            AssociationErrorKind::SelfAssociationAlias,
            self.model_name(source),
            alias,
            format!(
                "Both options \"as\" and \"inverse.as\" must be defined for {} self-associations, \
                 and their value must be different{extra}.",
                kind.method_name()
            ),
        )
    }

    fn unknown_key(&self, model: ModelId, alias: &str, option: &str, key: &str) -> Error {
        let name = self.model_name(model);
        Error::association(
            AssociationErrorKind::UnknownKey,
            &name,
            Some(alias),
            format!(
                "Unknown attribute \"{key}\" passed as {option}, define this attribute on model \"{name}\" first"
            ),
        )
    }

    /// Add or merge the foreign key attribute on `model`. Values already
    /// present on an existing attribute win over synthesized ones.
    fn synthesize_foreign_key(
        &mut self,
        model: ModelId,
        name: &str,
        options: &ForeignKeyOptions,
        data_type: DataType,
        reference: Option<References>,
        alias: &str,
    ) -> Result<String> {
        let model_name = self.model_name(model);
        let definition = self.catalog.model_mut(model)?;
        let existing = definition.get_attribute(name).cloned();

        let allow_null = existing
            .as_ref()
            .map(|a| a.allow_null)
            .or(options.allow_null)
            .unwrap_or(true);
        let mut attr = existing
            .clone()
            .unwrap_or_else(|| AttributeDescriptor::new(name, data_type));
        attr.allow_null = allow_null && !attr.primary_key;

        if let Some(reference) = reference {
            if let Some(current) = existing.as_ref().and_then(|a| a.references.as_ref()) {
                if current.table != reference.table {
                    return Err(Error::association(
                        AssociationErrorKind::ReferenceConflict,
                        &model_name,
                        Some(alias),
                        format!(
                            "Foreign key {name} on {model_name} already references {}, but this \
                             association needs to make it reference {} instead.",
                            current.table, reference.table
                        ),
                    ));
                }
                if let (Some(current_key), Some(new_key)) = (&current.key, &reference.key) {
                    if current_key != new_key {
                        return Err(Error::association(
                            AssociationErrorKind::ReferenceConflict,
                            &model_name,
                            Some(alias),
                            format!(
                                "Foreign key {name} on {model_name} already references column \
                                 {current_key}, but this association needs to make it reference \
                                 {new_key} instead."
                            ),
                        ));
                    }
                }
            }

            let on_delete = if allow_null {
                ReferentialAction::SetNull
            } else {
                ReferentialAction::Cascade
            };
            attr.on_delete = attr.on_delete.or(options.on_delete).or(Some(on_delete));
            attr.on_update = attr
                .on_update
                .or(options.on_update)
                .or(Some(ReferentialAction::Cascade));
            attr.references = Some(reference);
        }

        tracing::trace!(
            model = %model_name,
            foreign_key = %name,
            allow_null = attr.allow_null,
            references = ?attr.references,
            "Synthesized foreign key"
        );

        let field = attr.field.clone();
        definition.attributes.insert(name.to_string(), attr);
        Ok(field)
    }

    // ==================== BelongsTo ====================

    fn define_belongs_to(
        &mut self,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
        parent: Option<&ParentRef>,
    ) -> Result<AssociationId> {
        let kind = AssociationKind::BelongsTo;
        if let Some(inverse) = &options.inverse {
            if source == target {
                let alias = options.alias_str(kind);
                if alias.is_none() || inverse.alias.is_none() || alias == inverse.alias.as_deref() {
                    return Err(self.self_association_error(
                        kind,
                        source,
                        alias,
                        ", if you specify the 'inverse' option",
                    ));
                }
            }
            if !matches!(
                inverse.kind,
                Some(AssociationKind::HasOne | AssociationKind::HasMany)
            ) {
                return Err(Error::association(
                    AssociationErrorKind::InvalidOptions,
                    self.model_name(source),
                    options.alias_str(kind),
                    format!(
                        "Invalid option received for \"inverse.kind\": {:?}. Expected HasMany or HasOne",
                        inverse.kind
                    ),
                ));
            }
        }

        let options = match self.prepare(kind, source, target, options, parent)? {
            Prepared::Existing(id) => return Ok(id),
            Prepared::New(options) => options,
        };

        let target_def = self.catalog.model(target)?;
        let target_key = match &options.target_key {
            Some(key) => key.clone(),
            None => target_def
                .primary_key_attribute()
                .map(str::to_string)
                .ok_or_else(|| self.unknown_key(target, &options.alias, "targetKey", "<primary key>"))?,
        };
        let target_attr = target_def
            .get_attribute(&target_key)
            .ok_or_else(|| self.unknown_key(target, &options.alias, "targetKey", &target_key))?;
        let target_key_field = target_attr.field.clone();
        let key_type = target_attr.data_type.clone();
        let target_table = target_def.table_name.clone();

        let foreign_key = options
            .foreign_key
            .name
            .clone()
            .unwrap_or_else(|| camelize(&format!("{}_{}", options.name.singular, target_key)));

        let reference = options
            .constraints_enabled()
            .then(|| References::new(target_table, target_key_field.clone()));
        let foreign_key_field = self.synthesize_foreign_key(
            source,
            &foreign_key,
            &options.foreign_key,
            key_type,
            reference,
            &options.alias,
        )?;

        let id = self.reserve();
        let inverse_options = options.inverse.clone();
        let parent_ref = ParentRef {
            id,
            alias: options.alias.clone(),
        };
        let pass_down = AssociationOptions {
            alias: None,
            foreign_key: options.foreign_key.clone(),
            source_key: options.target_key.clone(),
            foreign_key_constraints: options.foreign_key_constraints,
            ..AssociationOptions::default()
        };

        self.fill(Association::BelongsTo(BelongsTo {
            core: AssociationCore {
                id,
                source,
                target,
                foreign_key,
                foreign_key_field,
                is_self_association: source == target,
                parent: parent.map(|p| p.id),
                options,
            },
            target_key,
            target_key_field,
            inverse: None,
        }));

        if let Some(inverse) = inverse_options {
            let inverse_kind = inverse.kind.unwrap_or(AssociationKind::HasMany);
            let pass_down = AssociationOptions {
                alias: inverse.alias.map(AliasOption::Name),
                ..pass_down
            };
            let inverse_id =
                self.define_has(inverse_kind, target, source, pass_down, Some(&parent_ref), Some(id))?;
            if let Some(Association::BelongsTo(bt)) = self.slot_mut(id) {
                bt.inverse = Some(inverse_id);
            }
        }

        Ok(id)
    }

    // ==================== HasOne / HasMany ====================

    fn define_has(
        &mut self,
        kind: AssociationKind,
        source: ModelId,
        target: ModelId,
        options: AssociationOptions,
        parent: Option<&ParentRef>,
        existing_inverse: Option<AssociationId>,
    ) -> Result<AssociationId> {
        if existing_inverse.is_none() && source == target {
            let alias = options.alias_str(kind);
            let inverse = options.inverse_alias();
            if alias.is_none() || inverse.is_none() || alias == inverse {
                return Err(self.self_association_error(kind, source, alias, ""));
            }
        }
        if options.through.is_some() {
            return Err(Error::association(
                AssociationErrorKind::InvalidOptions,
                self.model_name(source),
                options.alias_str(kind),
                format!(
                    "The \"through\" option is not available in {}. N:M associations are defined using belongsToMany instead.",
                    kind.method_name()
                ),
            ));
        }

        let options = match self.prepare(kind, source, target, options, parent)? {
            Prepared::Existing(id) => return Ok(id),
            Prepared::New(options) => options,
        };

        if let Some(source_key) = &options.source_key {
            if !self.catalog.model(source)?.has_attribute(source_key) {
                return Err(self.unknown_key(source, &options.alias, "sourceKey", source_key));
            }
        }

        let id = self.reserve();
        let inverse_id = match existing_inverse {
            Some(inverse) => inverse,
            None => {
                let parent_ref = ParentRef {
                    id,
                    alias: options.alias.clone(),
                };
                let inverse_options = AssociationOptions {
                    alias: options
                        .inverse
                        .as_ref()
                        .and_then(|i| i.alias.clone())
                        .map(AliasOption::Name),
                    foreign_key: options.foreign_key.clone(),
                    target_key: options.source_key.clone(),
                    foreign_key_constraints: options.foreign_key_constraints,
                    ..AssociationOptions::default()
                };
                self.define_belongs_to(target, source, inverse_options, Some(&parent_ref))?
            }
        };

        let inverse = self
            .association(inverse_id)
            .and_then(Association::as_belongs_to)
            .ok_or_else(|| {
                Error::association(
                    AssociationErrorKind::InvalidOptions,
                    self.model_name(source),
                    Some(&options.alias),
                    "the inverse of a HasOne/HasMany association must be a BelongsTo",
                )
            })?;

        let has = HasAssociation {
            core: AssociationCore {
                id,
                source,
                target,
                foreign_key: inverse.core.foreign_key.clone(),
                foreign_key_field: inverse.core.foreign_key_field.clone(),
                is_self_association: source == target,
                parent: parent.map(|p| p.id),
                options,
            },
            source_key: inverse.target_key.clone(),
            source_key_field: inverse.target_key_field.clone(),
            inverse: inverse_id,
        };

        self.fill(if kind == AssociationKind::HasOne {
            Association::HasOne(has)
        } else {
            Association::HasMany(has)
        });
        Ok(id)
    }

    // ==================== BelongsToMany ====================

    fn resolve_through(&mut self, source: ModelId, model: &ThroughModel) -> Result<ModelId> {
        let invalid = |registry: &Self, message: String| {
            Error::association(
                AssociationErrorKind::InvalidThrough,
                registry.model_name(source),
                None,
                message,
            )
        };
        match model {
            ThroughModel::Id(id) if self.catalog.contains(*id) => Ok(*id),
            ThroughModel::Id(id) => Err(invalid(self, format!("through model {id} is not defined"))),
            ThroughModel::Name(name) if name.trim().is_empty() => Err(invalid(
                self,
                "through model name must not be empty".to_string(),
            )),
            ThroughModel::Name(name) => match self.catalog.id_of(name) {
                Some(id) => Ok(id),
                None => {
                    tracing::debug!(through = %name, "Creating through model");
                    self.catalog
                        .define(ModelDefinition::new(name.clone()).table(name.clone()))
                }
            },
        }
    }

    fn define_belongs_to_many(
        &mut self,
        source: ModelId,
        target: ModelId,
        mut options: AssociationOptions,
        parent: Option<&ParentRef>,
        pair: Option<PairInfo>,
    ) -> Result<AssociationId> {
        let kind = AssociationKind::BelongsToMany;
        if source == target {
            let alias = options.alias_str(kind);
            let inverse = options.inverse_alias();
            if alias.is_none() || inverse.is_none() || alias == inverse {
                return Err(self.self_association_error(kind, source, alias, ""));
            }
        }

        let through = options.through.clone().ok_or_else(|| {
            Error::association(
                AssociationErrorKind::InvalidThrough,
                self.model_name(source),
                options.alias_str(kind),
                "belongsToMany requires a \"through\" option",
            )
        })?;
        let through_id = self.resolve_through(source, &through.model)?;
        options.through = Some(ThroughOptions {
            model: ThroughModel::Id(through_id),
            unique: through.unique.clone(),
        });

        let options = match self.prepare(kind, source, target, options, parent)? {
            Prepared::Existing(id) => return Ok(id),
            Prepared::New(options) => options,
        };

        let source_def = self.catalog.model(source)?;
        let source_key = options
            .source_key
            .clone()
            .or_else(|| source_def.primary_key_attribute().map(str::to_string))
            .ok_or_else(|| self.unknown_key(source, &options.alias, "sourceKey", "<primary key>"))?;
        let source_key_field = source_def
            .get_attribute(&source_key)
            .map(|a| a.field.clone())
            .ok_or_else(|| self.unknown_key(source, &options.alias, "sourceKey", &source_key))?;
        let source_singular = source_def.display_name.singular.clone();

        let target_def = self.catalog.model(target)?;
        let target_key = options
            .target_key
            .clone()
            .or_else(|| target_def.primary_key_attribute().map(str::to_string))
            .ok_or_else(|| self.unknown_key(target, &options.alias, "targetKey", "<primary key>"))?;
        let target_key_field = target_def
            .get_attribute(&target_key)
            .map(|a| a.field.clone())
            .ok_or_else(|| self.unknown_key(target, &options.alias, "targetKey", &target_key))?;

        let id = self.reserve();
        let parent_ref = ParentRef {
            id,
            alias: options.alias.clone(),
        };

        let (paired_id, pair_name) = match &pair {
            Some(pair) => (pair.id, pair.name.clone()),
            None => {
                let inverse = options.inverse.clone().unwrap_or_default();
                let pair_options = AssociationOptions {
                    alias: inverse.alias.clone().map(AliasOption::Name),
                    foreign_key: options.other_key.clone(),
                    source_key: options.target_key.clone(),
                    target_key: options.source_key.clone(),
                    other_key: options.foreign_key.clone(),
                    through: options.through.clone(),
                    foreign_key_constraints: inverse.foreign_key_constraints,
                    through_associations: options.through_associations.swapped(),
                    inverse: Some(InverseOptions {
                        alias: Some(options.alias.clone()),
                        kind: None,
                        foreign_key_constraints: options.foreign_key_constraints,
                    }),
                };
                let pair_info = PairInfo {
                    id,
                    name: options.name.clone(),
                };
                let paired_id = self
                    .define_belongs_to_many(target, source, pair_options, Some(&parent_ref), Some(pair_info))
                    .map_err(|err| match err {
                        Error::Association(mut inner) => {
                            inner.message = format!(
                                "BelongsToMany associations automatically create the corresponding \
                                 association on the target model, but this association failed to \
                                 create its paired association (BelongsToMany from {} to {}): {}",
                                self.model_name(target),
                                self.model_name(source),
                                inner.message
                            );
                            Error::Association(inner)
                        }
                        other => other,
                    })?;
                let paired = self
                    .association(paired_id)
                    .and_then(Association::as_belongs_to_many)
                    .filter(|p| p.paired == id)
                    .ok_or_else(|| {
                        Error::association(
                            AssociationErrorKind::AliasConflict,
                            self.model_name(source),
                            Some(&options.alias),
                            format!(
                                "the paired BelongsToMany from {} to {} already exists; declare \
                                 the other side through the \"inverse\" option instead of \
                                 defining both sides",
                                self.model_name(target),
                                self.model_name(source)
                            ),
                        )
                    })?;
                (paired_id, paired.core.options.name.clone())
            }
        };

        let is_self_association = source == target;
        let foreign_key = options.foreign_key.name.clone().unwrap_or_else(|| {
            let base = if is_self_association {
                &pair_name.singular
            } else {
                &source_singular
            };
            camelize(&format!("{base}_{source_key}"))
        });
        let leg_foreign_key = ForeignKeyOptions {
            name: Some(foreign_key.clone()),
            allow_null: Some(options.foreign_key.allow_null.unwrap_or(false)),
            ..options.foreign_key.clone()
        };

        let legs = options.through_associations.clone();
        let many_alias = legs.from_source.clone().unwrap_or_else(|| {
            format!("{}{}", options.name.plural, upper_first(&pair_name.plural))
        });
        let many_inverse = legs
            .to_source
            .clone()
            .unwrap_or_else(|| pair_name.singular.clone());
        let from_source_to_through = self.define_has(
            AssociationKind::HasMany,
            source,
            through_id,
            AssociationOptions {
                alias: Some(AliasOption::Name(many_alias)),
                foreign_key: leg_foreign_key.clone(),
                source_key: options.source_key.clone(),
                foreign_key_constraints: options.foreign_key_constraints,
                inverse: Some(InverseOptions::alias(many_inverse)),
                ..AssociationOptions::default()
            },
            Some(&parent_ref),
            None,
        )?;

        let one_alias = legs.from_source.as_deref().map_or_else(
            || format!("{}{}", options.name.singular, upper_first(&pair_name.singular)),
            singularize,
        );
        let one_inverse = legs
            .to_source
            .as_deref()
            .map_or_else(|| pair_name.singular.clone(), singularize);
        let from_source_to_through_one = self.define_has(
            AssociationKind::HasOne,
            source,
            through_id,
            AssociationOptions {
                alias: Some(AliasOption::Name(one_alias)),
                foreign_key: leg_foreign_key,
                source_key: options.source_key.clone(),
                foreign_key_constraints: options.foreign_key_constraints,
                inverse: Some(InverseOptions::alias(one_inverse)),
                ..AssociationOptions::default()
            },
            Some(&parent_ref),
            None,
        )?;

        let foreign_key_field = self.catalog.model(through_id)?.column_name(&foreign_key).to_string();
        let through_unique = through.unique;

        self.fill(Association::BelongsToMany(BelongsToMany {
            core: AssociationCore {
                id,
                source,
                target,
                foreign_key,
                foreign_key_field,
                is_self_association,
                parent: parent.map(|p| p.id),
                options,
            },
            source_key,
            source_key_field,
            target_key,
            target_key_field,
            other_key: String::new(),
            other_key_field: String::new(),
            through: through_id,
            through_unique,
            paired: paired_id,
            from_source_to_through,
            from_source_to_through_one,
        }));

        if pair.is_none() {
            self.link_pair(id, paired_id);
            self.make_fk_pair_unique(id)?;
        }

        Ok(id)
    }

    /// Each side's other key is its pair's foreign key.
    fn link_pair(&mut self, id: AssociationId, paired_id: AssociationId) {
        let keys = |registry: &Self, id| {
            registry.association(id).map(|a| {
                (
                    a.core().foreign_key.clone(),
                    a.core().foreign_key_field.clone(),
                )
            })
        };
        let (Some(own), Some(theirs)) = (keys(self, id), keys(self, paired_id)) else {
            return;
        };
        if let Some(Association::BelongsToMany(btm)) = self.slot_mut(id) {
            (btm.other_key, btm.other_key_field) = theirs;
        }
        if let Some(Association::BelongsToMany(btm)) = self.slot_mut(paired_id) {
            (btm.other_key, btm.other_key_field) = own;
        }
    }

    /// Make the through model's foreign key pair its primary key, or a
    /// unique key when the through model declares its own primary key.
    fn make_fk_pair_unique(&mut self, id: AssociationId) -> Result<()> {
        let Some(btm) = self
            .association(id)
            .and_then(Association::as_belongs_to_many)
            .cloned()
        else {
            return Ok(());
        };
        let foreign_key = btm.core.foreign_key.clone();
        let other_key = btm.other_key.clone();
        let source_name = self.model_name(btm.core.source);
        let through = self.catalog.model_mut(btm.through)?;

        let mut generated = Vec::new();
        let mut has_primary_key = false;
        for (name, attr) in &through.attributes {
            if !attr.primary_key || *name == foreign_key || *name == other_key {
                continue;
            }
            if attr.auto_generated {
                generated.push(name.clone());
            } else {
                has_primary_key = true;
            }
        }
        for name in &generated {
            through.attributes.shift_remove(name);
        }

        if has_primary_key {
            let unique_key = match &btm.through_unique {
                ThroughUnique::Disabled => None,
                ThroughUnique::Named(name) if !name.is_empty() => Some(name.clone()),
                ThroughUnique::Named(_) | ThroughUnique::Default => {
                    let mut keys = [foreign_key.as_str(), other_key.as_str()];
                    keys.sort_unstable();
                    Some(format!("{}_{}_{}_unique", through.table_name, keys[0], keys[1]))
                }
            };
            if let Some(unique_key) = unique_key {
                for key in [&foreign_key, &other_key] {
                    if let Some(attr) = through.get_attribute_mut(key) {
                        attr.unique = Some(UniqueKey::Named(unique_key.clone()));
                    }
                }
            }
        } else {
            if matches!(&btm.through_unique, ThroughUnique::Named(name) if !name.is_empty()) {
                return Err(Error::association(
                    AssociationErrorKind::InvalidOptions,
                    source_name,
                    Some(&btm.core.options.alias),
                    "BelongsToMany: Option \"through.unique\" can only be used if the through \
                     model's foreign keys are not also the primary keys. Add your own primary key \
                     to the through model, on different attributes than the foreign keys, to be \
                     able to use this option.",
                ));
            }
            for key in [&foreign_key, &other_key] {
                if let Some(attr) = through.get_attribute_mut(key) {
                    attr.primary_key = true;
                    attr.allow_null = false;
                }
            }
        }

        tracing::trace!(
            through = %through.name,
            foreign_key = %foreign_key,
            other_key = %other_key,
            composite_primary_key = !has_primary_key,
            "Finalized through model keys"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssociationErrorKind;

    fn registry_with(names: &[&str]) -> (AssociationRegistry, Vec<ModelId>) {
        let mut registry = AssociationRegistry::default();
        let ids = names
            .iter()
            .map(|n| registry.define_model(ModelDefinition::new(*n)).unwrap())
            .collect();
        (registry, ids)
    }

    fn model<'a>(registry: &'a AssociationRegistry, name: &str) -> &'a ModelDefinition {
        registry.catalog().by_name(name).unwrap()
    }

    // ==================== BelongsTo Tests ====================

    #[test]
    fn test_belongs_to_synthesizes_foreign_key() {
        let (mut registry, ids) = registry_with(&["Task", "User"]);
        let id = registry.belongs_to(ids[0], ids[1], AssociationOptions::new()).unwrap();

        let assoc = registry.association(id).unwrap();
        assert_eq!(assoc.alias(), "user");
        assert_eq!(assoc.foreign_key(), "userId");

        let fk = model(&registry, "Task").get_attribute("userId").unwrap();
        assert_eq!(fk.data_type, DataType::Integer);
        assert!(fk.allow_null);
        assert_eq!(fk.references, Some(References::new("Users", "id")));
        assert_eq!(fk.on_delete, Some(ReferentialAction::SetNull));
        assert_eq!(fk.on_update, Some(ReferentialAction::Cascade));
    }

    #[test]
    fn test_belongs_to_not_null_cascades() {
        let (mut registry, ids) = registry_with(&["Task", "User"]);
        registry
            .belongs_to(
                ids[0],
                ids[1],
                AssociationOptions::new()
                    .alias("owner")
                    .foreign_key(ForeignKeyOptions::default().allow_null(false)),
            )
            .unwrap();
        let fk = model(&registry, "Task").get_attribute("ownerId").unwrap();
        assert!(!fk.allow_null);
        assert_eq!(fk.on_delete, Some(ReferentialAction::Cascade));
    }

    #[test]
    fn test_belongs_to_without_constraints() {
        let (mut registry, ids) = registry_with(&["Task", "User"]);
        registry
            .belongs_to(ids[0], ids[1], AssociationOptions::new().foreign_key_constraints(false))
            .unwrap();
        let fk = model(&registry, "Task").get_attribute("userId").unwrap();
        assert_eq!(fk.references, None);
        assert_eq!(fk.on_delete, None);
    }

    #[test]
    fn test_belongs_to_unknown_target_key() {
        let (mut registry, ids) = registry_with(&["Task", "User"]);
        let err = registry
            .belongs_to(ids[0], ids[1], AssociationOptions::new().target_key("uuid"))
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::UnknownKey));
        assert!(err.to_string().contains("\"uuid\""));
    }

    #[test]
    fn test_belongs_to_with_inverse_has_many() {
        let (mut registry, ids) = registry_with(&["Task", "User"]);
        let id = registry
            .belongs_to(
                ids[0],
                ids[1],
                AssociationOptions::new()
                    .inverse("tasks")
                    .inverse_kind(AssociationKind::HasMany),
            )
            .unwrap();
        let inverse_id = registry.association(id).unwrap().inverse().unwrap();
        let inverse = registry.association(inverse_id).unwrap();
        assert_eq!(inverse.kind(), AssociationKind::HasMany);
        assert_eq!(inverse.source(), ids[1]);
        assert_eq!(inverse.foreign_key(), "userId");
        assert_eq!(inverse.parent(), Some(id));
    }

    #[test]
    fn test_belongs_to_inverse_requires_kind() {
        let (mut registry, ids) = registry_with(&["Task", "User"]);
        let err = registry
            .belongs_to(ids[0], ids[1], AssociationOptions::new().inverse("tasks"))
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::InvalidOptions));
    }

    #[test]
    fn test_reference_conflict() {
        let (mut registry, ids) = registry_with(&["Task", "User", "Team"]);
        registry
            .belongs_to(ids[0], ids[1], AssociationOptions::new().alias("owner"))
            .unwrap();
        let err = registry
            .belongs_to(
                ids[0],
                ids[2],
                AssociationOptions::new().alias("team").foreign_key("ownerId"),
            )
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::ReferenceConflict)
        );
    }

    // ==================== HasMany / HasOne Tests ====================

    #[test]
    fn test_has_many_creates_inverse_belongs_to() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let id = registry.has_many(ids[0], ids[1], AssociationOptions::new()).unwrap();

        let has_many = registry.association(id).unwrap();
        assert_eq!(has_many.alias(), "tasks");
        assert_eq!(has_many.foreign_key(), "userId");
        let has = has_many.as_has().unwrap();
        assert_eq!(has.source_key, "id");

        let inverse = registry.get(ids[1], "user").unwrap();
        assert_eq!(inverse.kind(), AssociationKind::BelongsTo);
        assert_eq!(inverse.parent(), Some(id));
        assert!(model(&registry, "Task").has_attribute("userId"));
    }

    #[test]
    fn test_has_many_reuses_existing_belongs_to() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let bt = registry.belongs_to(ids[1], ids[0], AssociationOptions::new()).unwrap();
        let hm = registry.has_many(ids[0], ids[1], AssociationOptions::new()).unwrap();
        let inverse = registry.association(hm).unwrap().inverse();
        assert_eq!(inverse, Some(bt));
    }

    #[test]
    fn test_has_one_unknown_source_key() {
        let (mut registry, ids) = registry_with(&["User", "Profile"]);
        let err = registry
            .has_one(ids[0], ids[1], AssociationOptions::new().source_key("email"))
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::UnknownKey));
    }

    #[test]
    fn test_has_many_rejects_through() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let err = registry
            .has_many(ids[0], ids[1], AssociationOptions::new().through("UserTasks"))
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::InvalidOptions));
    }

    #[test]
    fn test_has_many_self_association_needs_aliases() {
        let (mut registry, ids) = registry_with(&["Person"]);
        let err = registry
            .has_many(ids[0], ids[0], AssociationOptions::new().alias("children"))
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::SelfAssociationAlias)
        );

        registry
            .has_many(
                ids[0],
                ids[0],
                AssociationOptions::new().alias("children").inverse("parent"),
            )
            .unwrap();
        assert!(model(&registry, "Person").has_attribute("parentId"));
    }

    // ==================== Uniqueness Tests ====================

    #[test]
    fn test_identical_redeclaration_is_idempotent() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let first = registry.has_many(ids[0], ids[1], AssociationOptions::new()).unwrap();
        let second = registry.has_many(ids[0], ids[1], AssociationOptions::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_incompatible_redeclaration_conflicts() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        registry.has_many(ids[0], ids[1], AssociationOptions::new()).unwrap();
        let err = registry
            .has_many(ids[0], ids[1], AssociationOptions::new().foreign_key("ownerId"))
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::AliasConflict));
        assert!(err.to_string().contains("same name \"tasks\""));
    }

    #[test]
    fn test_child_conflict_names_root_declaration() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        registry.has_many(ids[0], ids[1], AssociationOptions::new()).unwrap();
        // the inverse BelongsTo `user` on Task exists; a HasOne under that alias conflicts
        let err = registry
            .has_one(ids[1], ids[0], AssociationOptions::new().alias("user").inverse("task"))
            .unwrap_err();
        let message = err.to_string();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::AliasConflict));
        assert!(message.contains("User.hasMany(Task"), "{message}");
        assert!(message.contains("their types are different"), "{message}");
    }

    #[test]
    fn test_naming_collision_with_attribute() {
        let mut registry = AssociationRegistry::default();
        let user = registry
            .define_model(
                ModelDefinition::new("User")
                    .attribute(AttributeDescriptor::new("tasks", DataType::Json)),
            )
            .unwrap();
        let task = registry.define_model(ModelDefinition::new("Task")).unwrap();
        let err = registry
            .has_many(user, task, AssociationOptions::new())
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::NamingCollision)
        );
    }

    // ==================== BelongsToMany Tests ====================

    #[test]
    fn test_belongs_to_many_creates_pair_and_through() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let id = registry
            .belongs_to_many(ids[0], ids[1], AssociationOptions::new().through("UserTasks"))
            .unwrap();

        let btm = registry.association(id).unwrap().as_belongs_to_many().unwrap().clone();
        assert_eq!(btm.core.foreign_key, "userId");
        assert_eq!(btm.other_key, "taskId");

        let paired = registry.association(btm.paired).unwrap().as_belongs_to_many().unwrap();
        assert_eq!(paired.paired, id);
        assert_eq!(paired.core.options.alias, "users");
        assert_eq!(paired.core.foreign_key, "taskId");
        assert_eq!(paired.other_key, "userId");
        assert_eq!(paired.through, btm.through);

        let through = model(&registry, "UserTasks");
        assert_eq!(through.table_name, "UserTasks");
        assert!(!through.has_attribute("id"));
        // the paired side defines its legs first
        assert_eq!(through.primary_key_attributes(), vec!["taskId", "userId"]);
    }

    #[test]
    fn test_belongs_to_many_leg_names() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        registry
            .belongs_to_many(ids[0], ids[1], AssociationOptions::new().through("UserTasks"))
            .unwrap();
        let through = registry.catalog().id_of("UserTasks").unwrap();

        assert_eq!(
            registry.get(ids[0], "tasksUsers").unwrap().kind(),
            AssociationKind::HasMany
        );
        assert_eq!(
            registry.get(ids[0], "taskUser").unwrap().kind(),
            AssociationKind::HasOne
        );
        assert_eq!(
            registry.get(ids[1], "usersTasks").unwrap().kind(),
            AssociationKind::HasMany
        );
        let to_user = registry.get(through, "user").unwrap();
        assert_eq!(to_user.kind(), AssociationKind::BelongsTo);
        assert_eq!(to_user.foreign_key(), "userId");
        assert_eq!(registry.get(through, "task").unwrap().foreign_key(), "taskId");
    }

    #[test]
    fn test_belongs_to_many_unique_key_when_through_has_own_pk() {
        let mut registry = AssociationRegistry::default();
        let user = registry.define_model(ModelDefinition::new("User")).unwrap();
        let task = registry.define_model(ModelDefinition::new("Task")).unwrap();
        let through = registry
            .define_model(
                ModelDefinition::new("Assignment").table("assignments").attribute(
                    AttributeDescriptor::new("assignmentId", DataType::Integer)
                        .primary_key()
                        .auto_increment(),
                ),
            )
            .unwrap();
        registry
            .belongs_to_many(user, task, AssociationOptions::new().through(through))
            .unwrap();

        let model = registry.catalog().model(through).unwrap();
        assert_eq!(model.primary_key_attributes(), vec!["assignmentId"]);
        let expected = Some(UniqueKey::Named("assignments_taskId_userId_unique".into()));
        assert_eq!(model.get_attribute("userId").unwrap().unique, expected);
        assert_eq!(model.get_attribute("taskId").unwrap().unique, expected);
    }

    #[test]
    fn test_belongs_to_many_named_unique_without_pk_is_error() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let err = registry
            .belongs_to_many(
                ids[0],
                ids[1],
                AssociationOptions::new().through(
                    ThroughOptions::new("UserTasks").unique(ThroughUnique::Named("ut".into())),
                ),
            )
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::InvalidOptions));
    }

    #[test]
    fn test_belongs_to_many_requires_through() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let err = registry
            .belongs_to_many(ids[0], ids[1], AssociationOptions::new())
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::InvalidThrough));

        let err = registry
            .belongs_to_many(ids[0], ids[1], AssociationOptions::new().through(""))
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::InvalidThrough));
    }

    #[test]
    fn test_failed_belongs_to_many_leaves_catalog_unchanged() {
        let mut registry = AssociationRegistry::default();
        let user = registry.define_model(ModelDefinition::new("User")).unwrap();
        let tag = registry
            .define_model(
                ModelDefinition::new("Tag")
                    .attribute(AttributeDescriptor::new("users", DataType::Json)),
            )
            .unwrap();

        let err = registry
            .belongs_to_many(user, tag, AssociationOptions::new().through("UserTags"))
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::NamingCollision)
        );
        assert_eq!(registry.catalog().len(), 2);
        assert!(registry.catalog().id_of("UserTags").is_none());
        assert_eq!(registry.associations_of(user).count(), 0);
        assert_eq!(registry.associations_of(tag).count(), 0);

        // the same declaration succeeds once the collision is gone
        let label = registry.define_model(ModelDefinition::new("Label")).unwrap();
        registry
            .belongs_to_many(user, label, AssociationOptions::new().through("UserTags"))
            .unwrap();
        assert_eq!(registry.catalog().len(), 4);
        assert!(registry.catalog().id_of("UserTags").is_some());
    }

    #[test]
    fn test_belongs_to_many_self_association_guard() {
        let (mut registry, ids) = registry_with(&["User"]);
        let err = registry
            .belongs_to_many(ids[0], ids[0], AssociationOptions::new().through("Follows"))
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::SelfAssociationAlias)
        );
        // rejected before the through model was created
        assert!(registry.catalog().id_of("Follows").is_none());

        let err = registry
            .belongs_to_many(
                ids[0],
                ids[0],
                AssociationOptions::new()
                    .through("Follows")
                    .alias("followers")
                    .inverse("followers"),
            )
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::SelfAssociationAlias)
        );

        let id = registry
            .belongs_to_many(
                ids[0],
                ids[0],
                AssociationOptions::new()
                    .through("Follows")
                    .alias("followers")
                    .inverse("following"),
            )
            .unwrap();
        let btm = registry.association(id).unwrap().as_belongs_to_many().unwrap();
        assert_eq!(btm.core.foreign_key, "followingId");
        assert_eq!(btm.other_key, "followerId");
    }

    #[test]
    fn test_belongs_to_many_other_side_redeclaration_reuses_pair() {
        let (mut registry, ids) = registry_with(&["User", "Task"]);
        let id = registry
            .belongs_to_many(ids[0], ids[1], AssociationOptions::new().through("UserTasks"))
            .unwrap();
        let paired = registry.association(id).unwrap().inverse().unwrap();
        let again = registry
            .belongs_to_many(ids[1], ids[0], AssociationOptions::new().through("UserTasks"))
            .unwrap();
        assert_eq!(again, paired);
    }

    // ==================== Two-phase Build Tests ====================

    #[test]
    fn test_declare_resolves_forward_references() {
        let mut registry = AssociationRegistry::default();
        registry.declare("User", "Task", AssociationKind::HasMany, AssociationOptions::new());
        registry.define_model(ModelDefinition::new("User")).unwrap();
        registry.define_model(ModelDefinition::new("Task")).unwrap();
        let graph = registry.freeze().unwrap();
        let user = graph.catalog().id_of("User").unwrap();
        assert!(graph.get(user, "tasks").is_some());
    }

    #[test]
    fn test_declare_unresolved_model() {
        let mut registry = AssociationRegistry::default();
        registry.define_model(ModelDefinition::new("User")).unwrap();
        registry.declare("User", "Ghost", AssociationKind::HasOne, AssociationOptions::new());
        let err = registry.freeze().unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::UnresolvedModel)
        );
        assert!(err.to_string().contains("\"Ghost\""));
    }
}
