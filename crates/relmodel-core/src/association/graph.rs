//! Immutable association graph produced by [`AssociationRegistry::freeze`].
//!
//! [`AssociationRegistry::freeze`]: super::AssociationRegistry::freeze

use super::{Association, AssociationId};
use crate::error::{Error, GenerationErrorKind, Result};
use crate::model::{ModelCatalog, ModelDefinition, ModelId};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct GraphInner {
    catalog: ModelCatalog,
    associations: Vec<Option<Association>>,
    by_source: HashMap<ModelId, IndexMap<String, AssociationId>>,
}

/// Read-only view of models and their associations.
///
/// Cloning is cheap; clones share the same graph and may be sent across
/// threads.
#[derive(Debug, Clone)]
pub struct AssociationGraph {
    inner: Arc<GraphInner>,
}

impl AssociationGraph {
    pub(crate) fn new(
        catalog: ModelCatalog,
        associations: Vec<Option<Association>>,
        by_source: HashMap<ModelId, IndexMap<String, AssociationId>>,
    ) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                catalog,
                associations,
                by_source,
            }),
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.inner.catalog
    }

    /// Model definition, failing with `ModelNotFound`.
    pub fn model(&self, id: ModelId) -> Result<&ModelDefinition> {
        self.inner.catalog.model(id)
    }

    pub fn association(&self, id: AssociationId) -> Option<&Association> {
        self.inner.associations.get(id.0).and_then(Option::as_ref)
    }

    /// Association declared on `source` under `alias`.
    pub fn get(&self, source: ModelId, alias: &str) -> Option<&Association> {
        self.inner
            .by_source
            .get(&source)
            .and_then(|m| m.get(alias))
            .and_then(|id| self.association(*id))
    }

    /// Like [`get`](Self::get), failing with `UnknownAssociation`.
    pub fn require(&self, source: ModelId, alias: &str) -> Result<&Association> {
        self.get(source, alias).ok_or_else(|| {
            let model = self
                .inner
                .catalog
                .get(source)
                .map_or_else(|| source.to_string(), |m| m.name.clone());
            Error::generation(
                GenerationErrorKind::UnknownAssociation,
                format!("Association with alias \"{alias}\" does not exist on {model}"),
            )
        })
    }

    /// Associations declared on `source`, in declaration order.
    pub fn associations_of(&self, source: ModelId) -> impl Iterator<Item = &Association> {
        self.inner
            .by_source
            .get(&source)
            .into_iter()
            .flat_map(|m| m.values())
            .filter_map(|id| self.association(*id))
    }

    /// Every association in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Association> {
        self.inner.associations.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
