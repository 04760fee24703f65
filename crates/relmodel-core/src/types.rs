//! SQL data types and their per-dialect rendering.

use crate::dialect::Dialect;
use crate::error::{Error, GenerationErrorKind, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

/// Semantic data type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    // Integer types
    TinyInt,
    SmallInt,
    MediumInt,
    Integer,
    BigInt,

    // Floating point
    Float,
    Real,
    Double,

    // Fixed precision
    Decimal {
        precision: Option<u8>,
        scale: Option<u8>,
    },

    // Boolean
    Boolean,

    // String types
    String(u32),
    Char(u32),
    Text,

    // Date/time types
    /// Date and time of day
    Date,
    /// Calendar date only
    DateOnly,
    Time,

    Uuid,
    Json,
    Blob,

    /// Enumerated strings. Must carry at least one value.
    Enum(Vec<String>),

    /// Type name emitted verbatim
    Raw(String),
}

impl Default for DataType {
    fn default() -> Self {
        DataType::String(255)
    }
}

impl DataType {
    /// Render the column type for a dialect.
    ///
    /// PostgreSQL enums render as `ENUM(...)` here; DDL generation replaces
    /// them with a named type created ahead of the table.
    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        let sql = match self {
            DataType::TinyInt => match dialect {
                Dialect::Postgres => "SMALLINT".to_string(),
                _ => "TINYINT".to_string(),
            },
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::MediumInt => match dialect {
                Dialect::Postgres => "INTEGER".to_string(),
                _ => "MEDIUMINT".to_string(),
            },
            DataType::Integer => "INTEGER".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Float => match dialect {
                Dialect::Postgres => "REAL".to_string(),
                _ => "FLOAT".to_string(),
            },
            DataType::Real => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("DECIMAL({p},{s})"),
                (Some(p), None) => format!("DECIMAL({p})"),
                _ => "DECIMAL".to_string(),
            },
            DataType::Boolean => match dialect {
                Dialect::Postgres => "BOOLEAN".to_string(),
                Dialect::Mysql | Dialect::Sqlite => "TINYINT(1)".to_string(),
            },
            DataType::String(len) => format!("VARCHAR({len})"),
            DataType::Char(len) => format!("CHAR({len})"),
            DataType::Text => "TEXT".to_string(),
            DataType::Date => match dialect {
                Dialect::Postgres => "TIMESTAMP WITH TIME ZONE".to_string(),
                Dialect::Mysql | Dialect::Sqlite => "DATETIME".to_string(),
            },
            DataType::DateOnly => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Uuid => match dialect {
                Dialect::Mysql => "CHAR(36) BINARY".to_string(),
                Dialect::Postgres | Dialect::Sqlite => "UUID".to_string(),
            },
            DataType::Json => "JSON".to_string(),
            DataType::Blob => match dialect {
                Dialect::Postgres => "BYTEA".to_string(),
                Dialect::Mysql | Dialect::Sqlite => "BLOB".to_string(),
            },
            DataType::Enum(values) => {
                if values.is_empty() {
                    return Err(Error::generation(
                        GenerationErrorKind::EmptyEnum,
                        "ENUM type requires at least one value",
                    ));
                }
                match dialect {
                    Dialect::Sqlite => "TEXT".to_string(),
                    Dialect::Mysql | Dialect::Postgres => {
                        format!("ENUM({})", enum_value_list(values, dialect))
                    }
                }
            }
            DataType::Raw(name) => name.clone(),
        };
        Ok(sql)
    }

    /// Serial pseudo-type for an auto-incrementing PostgreSQL column.
    pub fn serial_name(&self) -> Option<&'static str> {
        match self {
            DataType::TinyInt | DataType::SmallInt => Some("SMALLSERIAL"),
            DataType::MediumInt | DataType::Integer => Some("SERIAL"),
            DataType::BigInt => Some("BIGSERIAL"),
            _ => None,
        }
    }

    /// Values of an enum type.
    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            DataType::Enum(values) => Some(values),
            _ => None,
        }
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::MediumInt
                | DataType::Integer
                | DataType::BigInt
        )
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            DataType::String(_) | DataType::Char(_) | DataType::Text
        )
    }
}

/// `'a', 'b'` with dialect escaping.
pub fn enum_value_list(values: &[String], dialect: Dialect) -> String {
    values
        .iter()
        .map(|v| dialect.escape_string(v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*([A-Za-z][A-Za-z ]*?)\s*(?:\((.*)\))?\s*$").ok())
        .as_ref()
}

fn enum_item_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"'((?:[^']|'')*)'").ok())
        .as_ref()
}

fn parse_len(args: Option<&str>, default: u32) -> u32 {
    args.and_then(|a| a.trim().parse().ok()).unwrap_or(default)
}

/// Parses declarations such as `VARCHAR(100)`, `DECIMAL(10,2)` or
/// `ENUM('a','b')`. Unknown names become [`DataType::Raw`].
impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pattern = type_pattern()
            .ok_or_else(|| Error::Custom("data type pattern failed to compile".to_string()))?;
        let Some(caps) = pattern.captures(s) else {
            return Ok(DataType::Raw(s.trim().to_string()));
        };
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_default();
        let args = caps.get(2).map(|m| m.as_str());

        let ty = match name.as_str() {
            "TINYINT" if args.map(str::trim) == Some("1") => DataType::Boolean,
            "TINYINT" => DataType::TinyInt,
            "SMALLINT" => DataType::SmallInt,
            "MEDIUMINT" => DataType::MediumInt,
            "INT" | "INTEGER" => DataType::Integer,
            "BIGINT" => DataType::BigInt,
            "FLOAT" => DataType::Float,
            "REAL" => DataType::Real,
            "DOUBLE" | "DOUBLE PRECISION" => DataType::Double,
            "DECIMAL" | "NUMERIC" => {
                let mut parts = args
                    .unwrap_or_default()
                    .split(',')
                    .map(|p| p.trim().parse::<u8>().ok());
                DataType::Decimal {
                    precision: parts.next().flatten(),
                    scale: parts.next().flatten(),
                }
            }
            "BOOL" | "BOOLEAN" => DataType::Boolean,
            "VARCHAR" | "STRING" => DataType::String(parse_len(args, 255)),
            "CHAR" => DataType::Char(parse_len(args, 255)),
            "TEXT" => DataType::Text,
            "DATETIME" | "TIMESTAMP" | "TIMESTAMP WITH TIME ZONE" => DataType::Date,
            "DATE" | "DATEONLY" => DataType::DateOnly,
            "TIME" => DataType::Time,
            "UUID" => DataType::Uuid,
            "JSON" | "JSONB" => DataType::Json,
            "BLOB" | "BYTEA" => DataType::Blob,
            "ENUM" => {
                let items = enum_item_pattern().ok_or_else(|| {
                    Error::Custom("enum value pattern failed to compile".to_string())
                })?;
                let values = items
                    .captures_iter(args.unwrap_or_default())
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str().replace("''", "'"))
                    .collect();
                DataType::Enum(values)
            }
            _ => DataType::Raw(s.trim().to_string()),
        };
        Ok(ty)
    }
}
