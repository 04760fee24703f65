//! Attribute descriptors: one column of a model.

use crate::types::DataType;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Referential action for foreign key constraints (ON DELETE / ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a referential action (case-insensitive, spaces or underscores).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().replace('_', " ").as_str() {
            "NO ACTION" | "NOACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" | "SETNULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" | "SETDEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    /// Referenced table name
    pub table: String,
    /// Referenced column; the target's primary key when absent
    pub key: Option<String>,
}

impl References {
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: Some(key.into()),
        }
    }
}

/// Unique constraint participation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniqueKey {
    /// Single-column `UNIQUE`
    Unnamed,
    /// Member of a named, possibly composite, unique key
    Named(String),
}

/// Column metadata for one model attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Attribute name as used by callers
    pub name: String,
    /// Column name in the database
    pub field: String,
    pub data_type: DataType,
    pub allow_null: bool,
    pub default_value: Option<Value>,
    pub unique: Option<UniqueKey>,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Primary key added implicitly because the model declared none
    pub auto_generated: bool,
    pub references: Option<References>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub comment: Option<String>,
}

impl AttributeDescriptor {
    /// Create a nullable attribute whose column shares its name.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            data_type,
            allow_null: true,
            default_value: None,
            unique: None,
            primary_key: false,
            auto_increment: false,
            auto_generated: false,
            references: None,
            on_delete: None,
            on_update: None,
            comment: None,
        }
    }

    /// The implicit `id INTEGER` auto-increment primary key.
    pub fn generated_id() -> Self {
        let mut attr = Self::new("id", DataType::Integer)
            .primary_key()
            .auto_increment();
        attr.auto_generated = true;
        attr
    }

    /// Set the column name.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Mark as primary key; primary keys are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    pub fn allow_null(mut self, allow: bool) -> Self {
        self.allow_null = allow && !self.primary_key;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = Some(UniqueKey::Unnamed);
        self
    }

    /// Join a named composite unique key.
    pub fn unique_key(mut self, name: impl Into<String>) -> Self {
        self.unique = Some(UniqueKey::Named(name.into()));
        self
    }

    pub fn references(mut self, table: impl Into<String>, key: impl Into<String>) -> Self {
        self.references = Some(References::new(table, key));
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

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Name of the composite unique key this column belongs to, if any.
    pub fn unique_key_name(&self) -> Option<&str> {
        match &self.unique {
            Some(UniqueKey::Named(name)) => Some(name),
            _ => None,
        }
    }
}
