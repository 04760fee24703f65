//! Per-backend syntax and capability table.
//!
//! Every lexical difference between the supported databases is answered here:
//! identifier quoting, literal escaping, LIMIT/OFFSET shape and statement
//! capabilities. Generators branch on these answers and never on dialect
//! names directly.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB family (backtick quoting, backslash escapes)
    #[serde(alias = "mariadb")]
    Mysql,
    /// PostgreSQL dialect (double-quote quoting, RETURNING support)
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    /// SQLite dialect (backtick quoting, doubled-quote escapes)
    Sqlite,
}

/// Shape of the LIMIT/OFFSET fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT offset, count`
    OffsetComma,
    /// `LIMIT count OFFSET offset`
    LimitOffset,
}

/// How a DELETE honors a row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteLimit {
    /// `DELETE ... LIMIT n`
    Native,
    /// `DELETE ... WHERE pk IN (SELECT pk ... LIMIT n)`
    PrimaryKeySubselect,
    /// DELETE has no limit; the request is dropped
    Ignored,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 3] = [Dialect::Mysql, Dialect::Postgres, Dialect::Sqlite];

    /// Lowercase dialect name.
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Identifier quote character.
    pub const fn quote_char(self) -> char {
        match self {
            Dialect::Mysql | Dialect::Sqlite => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are doubled. Quoting is idempotent: an
    /// identifier already wrapped in this dialect's quotes is unwrapped first,
    /// so `quote(quote(x)) == quote(x)`.
    pub fn quote_identifier(self, name: &str) -> String {
        let q = self.quote_char();
        let bare = self.unquote_identifier(name);
        let escaped = bare.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Strip one level of this dialect's quoting, if present.
    pub fn unquote_identifier(self, name: &str) -> String {
        let q = self.quote_char();
        if name.len() >= 2 && name.starts_with(q) && name.ends_with(q) {
            name[1..name.len() - 1].replace(&format!("{q}{q}"), &q.to_string())
        } else {
            name.to_string()
        }
    }

    /// Quote a possibly qualified name (`schema.table`, `table.column`)
    /// segment by segment. A trailing `*` stays bare.
    pub fn quote_identifiers(self, dotted: &str) -> String {
        dotted
            .split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    self.quote_identifier(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Escape a string into a quoted SQL literal.
    pub fn escape_string(self, s: &str) -> String {
        match self {
            Dialect::Mysql => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for ch in s.chars() {
                    match ch {
                        '\0' => out.push_str("\\0"),
                        '\u{8}' => out.push_str("\\b"),
                        '\t' => out.push_str("\\t"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\u{1a}' => out.push_str("\\Z"),
                        '"' => out.push_str("\\\""),
                        '\'' => out.push_str("\\'"),
                        '\\' => out.push_str("\\\\"),
                        other => out.push(other),
                    }
                }
                out.push('\'');
                out
            }
            Dialect::Postgres | Dialect::Sqlite => format!("'{}'", s.replace('\'', "''")),
        }
    }

    /// Boolean literal.
    pub const fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::Postgres, true) => "true",
            (Dialect::Postgres, false) => "false",
            (Dialect::Mysql | Dialect::Sqlite, true) => "1",
            (Dialect::Mysql | Dialect::Sqlite, false) => "0",
        }
    }

    /// Render a value as an escaped SQL literal.
    pub fn escape(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => self.bool_literal(*b).to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(f) => self.escape_string(&f.to_string()),
            Value::Decimal(d) => {
                if d.parse::<f64>().is_ok_and(f64::is_finite) {
                    d.clone()
                } else {
                    self.escape_string(d)
                }
            }
            Value::Text(s) => self.escape_string(s),
            Value::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                match self {
                    Dialect::Postgres => format!("E'\\\\x{hex}'"),
                    Dialect::Mysql | Dialect::Sqlite => format!("X'{hex}'"),
                }
            }
            Value::Json(json) => self.escape_string(&json.to_string()),
            Value::Array(items) => items
                .iter()
                .map(|v| self.escape(v))
                .collect::<Vec<_>>()
                .join(","),
            Value::Default => "DEFAULT".to_string(),
            Value::Raw(sql) => sql.clone(),
        }
    }

    /// Shape of the LIMIT/OFFSET fragment.
    pub const fn limit_style(self) -> LimitStyle {
        match self {
            Dialect::Mysql | Dialect::Sqlite => LimitStyle::OffsetComma,
            Dialect::Postgres => LimitStyle::LimitOffset,
        }
    }

    /// Render the LIMIT/OFFSET fragment with a leading space, or an empty
    /// string when neither applies. A zero offset is treated as absent.
    pub fn limit_clause(self, limit: Option<u64>, offset: Option<u64>) -> String {
        let offset = offset.filter(|o| *o > 0);
        match self.limit_style() {
            LimitStyle::OffsetComma => match (limit, offset) {
                (Some(limit), Some(offset)) => format!(" LIMIT {offset}, {limit}"),
                (Some(limit), None) => format!(" LIMIT {limit}"),
                (None, Some(offset)) => {
                    // offset needs a count; use the dialect's "no limit" value
                    let unbounded = match self {
                        Dialect::Sqlite => "-1",
                        _ => "18446744073709551615",
                    };
                    format!(" LIMIT {offset}, {unbounded}")
                }
                (None, None) => String::new(),
            },
            LimitStyle::LimitOffset => {
                let mut out = String::new();
                if let Some(limit) = limit {
                    out.push_str(&format!(" LIMIT {limit}"));
                }
                if let Some(offset) = offset {
                    out.push_str(&format!(" OFFSET {offset}"));
                }
                out
            }
        }
    }

    /// Whether `INSERT/UPDATE ... RETURNING` is available.
    pub const fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// How DELETE honors a row limit.
    pub const fn delete_limit(self) -> DeleteLimit {
        match self {
            Dialect::Mysql => DeleteLimit::Native,
            Dialect::Postgres => DeleteLimit::PrimaryKeySubselect,
            Dialect::Sqlite => DeleteLimit::Ignored,
        }
    }

    /// Whether CREATE TABLE takes `ENGINE=`/`CHARSET=` table options.
    pub const fn supports_table_options(self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// Whether a `TRUNCATE` statement exists.
    pub const fn supports_truncate(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Whether `ROW_NUMBER() OVER (PARTITION BY ...)` may be relied upon.
    pub const fn supports_window_functions(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Operator token for regular-expression matching.
    pub const fn regexp_operator(self, negated: bool) -> &'static str {
        match (self, negated) {
            (Dialect::Postgres, false) => "~",
            (Dialect::Postgres, true) => "!~",
            (Dialect::Mysql | Dialect::Sqlite, false) => "REGEXP",
            (Dialect::Mysql | Dialect::Sqlite, true) => "NOT REGEXP",
        }
    }

    /// Keyword inserted after `INSERT` to skip duplicate rows.
    pub const fn insert_ignore_keyword(self) -> &'static str {
        match self {
            Dialect::Mysql => " IGNORE",
            Dialect::Sqlite => " OR IGNORE",
            Dialect::Postgres => "",
        }
    }

    /// Suffix appended to INSERT to skip duplicate rows.
    pub const fn insert_ignore_suffix(self) -> &'static str {
        match self {
            Dialect::Postgres => " ON CONFLICT DO NOTHING",
            Dialect::Mysql | Dialect::Sqlite => "",
        }
    }

    /// Values fragment for an INSERT with no columns.
    pub const fn empty_insert_values(self) -> &'static str {
        match self {
            Dialect::Mysql => " VALUES ()",
            Dialect::Postgres | Dialect::Sqlite => " DEFAULT VALUES",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(Error::Custom(format!("unknown dialect: {other}"))),
        }
    }
}
