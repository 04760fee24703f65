//! Model definitions and the catalog that owns them.

use crate::attribute::AttributeDescriptor;
use crate::error::{Error, Result, SchemaErrorKind};
use crate::index::IndexDefinition;
use crate::inflection::{pluralize, singularize};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Handle to a model inside a [`ModelCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub(crate) usize);

impl ModelId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Singular and plural display names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelName {
    pub singular: String,
    pub plural: String,
}

impl ModelName {
    /// Derive both forms from a name by inflection.
    pub fn from_name(name: &str) -> Self {
        Self {
            singular: singularize(name),
            plural: pluralize(name),
        }
    }
}

/// A model: table name plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub table_name: String,
    pub schema: Option<String>,
    pub display_name: ModelName,
    /// Attributes in column order
    pub attributes: IndexMap<String, AttributeDescriptor>,
    pub indexes: Vec<IndexDefinition>,
}

impl ModelDefinition {
    /// A model whose table is named after the plural of the model name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let display_name = ModelName::from_name(&name);
        Self {
            table_name: display_name.plural.clone(),
            display_name,
            name,
            schema: None,
            attributes: IndexMap::new(),
            indexes: Vec::new(),
        }
    }

    /// Set the table name.
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Override the inflected display names.
    pub fn display_name(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.display_name = ModelName {
            singular: singular.into(),
            plural: plural.into(),
        };
        self
    }

    /// Add or replace an attribute.
    pub fn attribute(mut self, attr: AttributeDescriptor) -> Self {
        self.attributes.insert(attr.name.clone(), attr);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    pub fn get_attribute_mut(&mut self, name: &str) -> Option<&mut AttributeDescriptor> {
        self.attributes.get_mut(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Look up an attribute or fail with `AttributeNotFound`.
    pub fn require_attribute(&self, name: &str) -> Result<&AttributeDescriptor> {
        self.attributes.get(name).ok_or_else(|| {
            Error::schema(
                SchemaErrorKind::AttributeNotFound,
                format!("attribute \"{name}\" is not defined on model \"{}\"", self.name),
            )
        })
    }

    /// Names of the primary key attributes, in column order.
    pub fn primary_key_attributes(&self) -> Vec<&str> {
        self.attributes
            .values()
            .filter(|a| a.primary_key)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// First primary key attribute.
    pub fn primary_key_attribute(&self) -> Option<&str> {
        self.attributes
            .values()
            .find(|a| a.primary_key)
            .map(|a| a.name.as_str())
    }

    /// Column names of the primary key.
    pub fn primary_key_fields(&self) -> Vec<&str> {
        self.attributes
            .values()
            .filter(|a| a.primary_key)
            .map(|a| a.field.as_str())
            .collect()
    }

    /// Column name of an attribute; unknown attributes map to themselves.
    pub fn column_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.attributes
            .get(attribute)
            .map_or(attribute, |a| a.field.as_str())
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.values().map(|a| a.field.as_str())
    }

    /// Prepend an auto-generated `id` primary key when none is declared.
    pub fn ensure_primary_key(&mut self) {
        if self.attributes.values().any(|a| a.primary_key) {
            return;
        }
        let id = AttributeDescriptor::generated_id();
        let mut attributes = IndexMap::with_capacity(self.attributes.len() + 1);
        attributes.insert(id.name.clone(), id);
        attributes.extend(self.attributes.drain(..));
        self.attributes = attributes;
    }
}

/// Arena of model definitions addressed by [`ModelId`].
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelDefinition>,
    by_name: HashMap<String, ModelId>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Models without a primary key receive an
    /// auto-generated `id`.
    pub fn define(&mut self, mut model: ModelDefinition) -> Result<ModelId> {
        if self.by_name.contains_key(&model.name) {
            return Err(Error::schema(
                SchemaErrorKind::DuplicateModel,
                format!("model \"{}\" is already defined", model.name),
            ));
        }
        model.ensure_primary_key();
        let id = ModelId(self.models.len());
        tracing::debug!(
            model = %model.name,
            table = %model.table_name,
            attributes = model.attributes.len(),
            "Defining model"
        );
        self.by_name.insert(model.name.clone(), id);
        self.models.push(model);
        Ok(id)
    }

    pub fn get(&self, id: ModelId) -> Option<&ModelDefinition> {
        self.models.get(id.0)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut ModelDefinition> {
        self.models.get_mut(id.0)
    }

    /// Look up a model or fail with `ModelNotFound`.
    pub fn model(&self, id: ModelId) -> Result<&ModelDefinition> {
        self.models.get(id.0).ok_or_else(|| model_not_found(&id.to_string()))
    }

    pub fn model_mut(&mut self, id: ModelId) -> Result<&mut ModelDefinition> {
        self.models
            .get_mut(id.0)
            .ok_or_else(|| model_not_found(&id.to_string()))
    }

    pub fn id_of(&self, name: &str) -> Option<ModelId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a model name or fail with `ModelNotFound`.
    pub fn require_id(&self, name: &str) -> Result<ModelId> {
        self.id_of(name).ok_or_else(|| model_not_found(name))
    }

    pub fn by_name(&self, name: &str) -> Option<&ModelDefinition> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn contains(&self, id: ModelId) -> bool {
        id.0 < self.models.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &ModelDefinition)> {
        self.models.iter().enumerate().map(|(i, m)| (ModelId(i), m))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn model_not_found(what: &str) -> Error {
    Error::schema(
        SchemaErrorKind::ModelNotFound,
        format!("model {what} is not defined"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn test_new_model_names() {
        let model = ModelDefinition::new("User");
        assert_eq!(model.table_name, "Users");
        assert_eq!(model.display_name.singular, "User");
        assert_eq!(model.display_name.plural, "Users");
    }

    #[test]
    fn test_generated_primary_key_comes_first() {
        let mut catalog = ModelCatalog::new();
        let id = catalog
            .define(
                ModelDefinition::new("Task")
                    .attribute(AttributeDescriptor::new("title", DataType::String(255))),
            )
            .unwrap();
        let task = catalog.model(id).unwrap();
        let names: Vec<&str> = task.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "title"]);
        assert!(task.attributes["id"].auto_generated);
    }

    #[test]
    fn test_declared_primary_key_is_kept() {
        let mut catalog = ModelCatalog::new();
        let id = catalog
            .define(
                ModelDefinition::new("Country").attribute(
                    AttributeDescriptor::new("code", DataType::Char(2)).primary_key(),
                ),
            )
            .unwrap();
        let model = catalog.model(id).unwrap();
        assert_eq!(model.primary_key_attributes(), vec!["code"]);
        assert!(!model.has_attribute("id"));
    }

    #[test]
    fn test_duplicate_model_is_error() {
        let mut catalog = ModelCatalog::new();
        catalog.define(ModelDefinition::new("User")).unwrap();
        let err = catalog.define(ModelDefinition::new("User")).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(crate::error::SchemaError {
                kind: SchemaErrorKind::DuplicateModel,
                ..
            })
        ));
    }

    #[test]
    fn test_column_name_uses_field() {
        let model = ModelDefinition::new("User")
            .attribute(AttributeDescriptor::new("firstName", DataType::Text).field("first_name"));
        assert_eq!(model.column_name("firstName"), "first_name");
        assert_eq!(model.column_name("unknown"), "unknown");
    }
}
