//! Error types for association resolution and SQL generation.

use std::fmt;

/// The primary error type for all relmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Definition-time association errors
    Association(AssociationError),
    /// Per-call SQL generation errors
    Generation(GenerationError),
    /// Model catalog errors
    Schema(SchemaError),
    /// Configuration errors
    Config(ConfigError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct AssociationError {
    pub kind: AssociationErrorKind,
    /// Name of the model the association is declared on
    pub source_model: String,
    /// Alias of the offending association, when known
    pub alias: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationErrorKind {
    /// Alias already used by an incompatible association
    AliasConflict,
    /// Alias shadows an attribute of the source model
    NamingCollision,
    /// Self-association without two distinct aliases
    SelfAssociationAlias,
    /// sourceKey/targetKey names an attribute that does not exist
    UnknownKey,
    /// Through model cannot be located or created
    InvalidThrough,
    /// Foreign key already references a different table or column
    ReferenceConflict,
    /// Forward reference to a model that was never defined
    UnresolvedModel,
    /// Options that cannot be combined
    InvalidOptions,
}

#[derive(Debug)]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    /// Dialect the statement was generated for, when relevant
    pub dialect: Option<&'static str>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The dialect does not define this operation
    UnsupportedOperation,
    /// Malformed predicate or unknown operator
    InvalidPredicate,
    /// ENUM attribute without values
    EmptyEnum,
    /// Index field without a name
    InvalidIndex,
    /// Operation needs primary key names that were not supplied
    MissingPrimaryKey,
    /// Nothing left to write after filtering values
    EmptyValues,
    /// Include or accessor names an association that does not exist
    UnknownAssociation,
    /// A row lacks the key needed to build the statement
    MissingKey,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// A model with this name is already registered
    DuplicateModel,
    /// Model not found
    ModelNotFound,
    /// Attribute not found
    AttributeNotFound,
    /// Invalid model definition
    Invalid,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Build an association error.
    pub fn association(
        kind: AssociationErrorKind,
        source_model: impl Into<String>,
        alias: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Association(AssociationError {
            kind,
            source_model: source_model.into(),
            alias: alias.map(str::to_string),
            message: message.into(),
        })
    }

    /// Build a generation error that is not tied to a dialect.
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Error::Generation(GenerationError {
            kind,
            dialect: None,
            message: message.into(),
        })
    }

    /// The operation is not defined for the given dialect.
    pub fn unsupported(operation: &str, dialect: &'static str) -> Self {
        Error::Generation(GenerationError {
            kind: GenerationErrorKind::UnsupportedOperation,
            dialect: Some(dialect),
            message: format!("{operation} is not defined for the {dialect} dialect"),
        })
    }

    /// Build a schema error.
    pub fn schema(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Error::Schema(SchemaError {
            kind,
            message: message.into(),
        })
    }

    /// Is this a definition-time association error?
    pub fn is_association_error(&self) -> bool {
        matches!(self, Error::Association(_))
    }

    /// The association error kind, if this is an association error.
    pub fn association_kind(&self) -> Option<AssociationErrorKind> {
        match self {
            Error::Association(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The generation error kind, if this is a generation error.
    pub fn generation_kind(&self) -> Option<GenerationErrorKind> {
        match self {
            Error::Generation(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Did a dialect refuse an operation it does not define?
    pub fn is_unsupported(&self) -> bool {
        self.generation_kind() == Some(GenerationErrorKind::UnsupportedOperation)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Association(e) => write!(f, "Association error: {}", e),
            Error::Generation(e) => write!(f, "Generation error: {}", e),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(
                f,
                "{} (model: {}, alias: {})",
                self.message, self.source_model, alias
            ),
            None => write!(f, "{} (model: {})", self.message, self.source_model),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dialect {
            Some(dialect) if !self.message.contains(dialect) => {
                write!(f, "{} [{}]", self.message, dialect)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<AssociationError> for Error {
    fn from(err: AssociationError) -> Self {
        Error::Association(err)
    }
}

impl From<GenerationError> for Error {
    fn from(err: GenerationError) -> Self {
        Error::Generation(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(ConfigError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

/// Result type alias for relmodel operations.
pub type Result<T> = std::result::Result<T, Error>;
