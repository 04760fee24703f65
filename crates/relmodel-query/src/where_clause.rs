//! Where-clause predicates and their compilation to SQL fragments.
//!
//! A [`Predicate`] is a tree of column conditions, `AND`/`OR` combinators and
//! raw SQL. [`WhereCompiler`] renders it for one dialect. Every value goes
//! through [`Dialect::escape`]; only [`Predicate::Raw`] and [`Value::Raw`]
//! reach the output unescaped.

use relmodel_core::error::GenerationErrorKind;
use relmodel_core::{Dialect, Error, Result, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    NotLike,
    Regexp,
    NotRegexp,
    Between,
    NotBetween,
    /// `IS NULL`, `IS TRUE`, `IS FALSE`
    Is,
    /// `IS NOT NULL`, `IS NOT TRUE`, `IS NOT FALSE`
    Not,
}

impl Op {
    /// Parse an operator key as written in JSON predicates. A leading `$` is
    /// accepted.
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key.strip_prefix('$').unwrap_or(key) {
            "eq" => Op::Eq,
            "ne" => Op::Ne,
            "gt" => Op::Gt,
            "gte" => Op::Gte,
            "lt" => Op::Lt,
            "lte" => Op::Lte,
            "in" => Op::In,
            "notIn" => Op::NotIn,
            "like" => Op::Like,
            "notLike" => Op::NotLike,
            "regexp" => Op::Regexp,
            "notRegexp" => Op::NotRegexp,
            "between" => Op::Between,
            "notBetween" => Op::NotBetween,
            "is" => Op::Is,
            "not" => Op::Not,
            _ => return None,
        };
        Some(op)
    }

    /// Operator token for simple binary comparisons.
    fn token(self, dialect: Dialect) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::Like => "LIKE",
            Op::NotLike => "NOT LIKE",
            Op::Regexp => dialect.regexp_operator(false),
            Op::NotRegexp => dialect.regexp_operator(true),
            Op::Between => "BETWEEN",
            Op::NotBetween => "NOT BETWEEN",
            Op::Is => "IS",
            Op::Not => "IS NOT",
        }
    }
}

/// A single `column <op> value` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name, optionally qualified as `table.column`
    pub column: String,
    pub op: Op,
    pub value: Value,
}

/// A where-clause tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Emitted verbatim. Never escaped.
    Raw(String),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::And(Vec::new())
    }
}

impl Predicate {
    /// The empty predicate; compiles to nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn condition(column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Predicate::Condition(Condition {
            column: column.into(),
            op,
            value: value.into(),
        })
    }

    /// `column = value`; NULL becomes `IS NULL`, a list becomes `IN`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Op::Eq, value)
    }

    /// `column != value`; NULL becomes `IS NOT NULL`.
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Op::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Op::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Op::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Op::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Op::Lte, value)
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::condition(column, Op::In, Value::Array(values))
    }

    pub fn not_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::condition(column, Op::NotIn, Value::Array(values))
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::condition(column, Op::Like, Value::Text(pattern.into()))
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::condition(column, Op::Between, Value::Array(vec![low.into(), high.into()]))
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Raw(sql.into())
    }

    pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(predicates.into_iter().collect())
    }

    pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(predicates.into_iter().collect())
    }

    /// Combine with another predicate under `AND`, flattening top-level
    /// conjunctions.
    pub fn and_also(self, other: Predicate) -> Self {
        match (self, other) {
            (p, q) if q.is_empty() => p,
            (p, q) if p.is_empty() => q,
            (Predicate::And(mut items), Predicate::And(more)) => {
                items.extend(more);
                Predicate::And(items)
            }
            (Predicate::And(mut items), q) => {
                items.push(q);
                Predicate::And(items)
            }
            (p, q) => Predicate::And(vec![p, q]),
        }
    }

    /// Whether this predicate renders nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Condition(_) => false,
            Predicate::And(items) | Predicate::Or(items) => items.iter().all(Predicate::is_empty),
            Predicate::Raw(sql) => sql.trim().is_empty(),
        }
    }

    /// Parse the JSON predicate form:
    /// `{"id": [1, 2], "name": {"ne": null}, "$or": [...], "$and": [...], "$raw": "..."}`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Ok(Predicate::empty()),
            Json::String(sql) => Ok(Predicate::Raw(sql.clone())),
            Json::Array(items) => items
                .iter()
                .map(Predicate::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Predicate::And),
            Json::Object(map) => {
                let mut items = Vec::with_capacity(map.len());
                for (key, value) in map {
                    items.push(match key.as_str() {
                        "$or" => Predicate::Or(json_children(key, value)?),
                        "$and" => Predicate::And(json_children(key, value)?),
                        "$raw" => match value {
                            Json::String(sql) => Predicate::Raw(sql.clone()),
                            other => {
                                return Err(invalid(format!(
                                    "\"$raw\" expects a string, got {other}"
                                )));
                            }
                        },
                        column => column_from_json(column, value)?,
                    });
                }
                Ok(Predicate::And(items))
            }
            other => Err(invalid(format!(
                "a where clause must be an object, array, string or null, got {other}"
            ))),
        }
    }
}

fn invalid(message: String) -> Error {
    Error::generation(GenerationErrorKind::InvalidPredicate, message)
}

fn json_children(key: &str, value: &serde_json::Value) -> Result<Vec<Predicate>> {
    match value {
        serde_json::Value::Array(items) => items.iter().map(Predicate::from_json).collect(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let mut single = serde_json::Map::new();
                single.insert(k.clone(), v.clone());
                Predicate::from_json(&serde_json::Value::Object(single))
            })
            .collect(),
        other => Err(invalid(format!(
            "\"{key}\" expects an array or object, got {other}"
        ))),
    }
}

fn column_from_json(column: &str, value: &serde_json::Value) -> Result<Predicate> {
    let serde_json::Value::Object(ops) = value else {
        let op = if value.is_array() { Op::In } else { Op::Eq };
        return Ok(Predicate::condition(column, op, Value::from(value.clone())));
    };
    if ops.is_empty() {
        return Err(invalid(format!("no operator given for column \"{column}\"")));
    }
    let mut conditions = ops
        .iter()
        .map(|(key, operand)| {
            let op = Op::from_key(key).ok_or_else(|| {
                invalid(format!("unknown operator \"{key}\" for column \"{column}\""))
            })?;
            Ok(Predicate::condition(column, op, Value::from(operand.clone())))
        })
        .collect::<Result<Vec<_>>>()?;
    if conditions.len() == 1 {
        Ok(conditions.remove(0))
    } else {
        Ok(Predicate::And(conditions))
    }
}

/// Renders predicates for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct WhereCompiler {
    dialect: Dialect,
}

impl WhereCompiler {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compile a predicate. Unqualified columns are prefixed with
    /// `qualifier` when one is given. Returns `None` for an empty predicate.
    pub fn compile(&self, predicate: &Predicate, qualifier: Option<&str>) -> Result<Option<String>> {
        self.render(predicate, qualifier, 0)
    }

    fn render(&self, predicate: &Predicate, qualifier: Option<&str>, depth: usize) -> Result<Option<String>> {
        match predicate {
            Predicate::Condition(condition) => self.condition(condition, qualifier),
            Predicate::Raw(sql) if sql.trim().is_empty() => Ok(None),
            Predicate::Raw(sql) => Ok(Some(sql.clone())),
            Predicate::And(items) => {
                let parts = self.render_all(items, qualifier, depth)?;
                Ok(match parts.len() {
                    0 => None,
                    1 => parts.into_iter().next(),
                    _ if depth == 0 => Some(parts.join(" AND ")),
                    _ => Some(format!("({})", parts.join(" AND "))),
                })
            }
            Predicate::Or(items) => {
                let parts = self.render_all(items, qualifier, depth)?;
                Ok(match parts.len() {
                    0 => None,
                    1 => parts.into_iter().next(),
                    _ => Some(format!("({})", parts.join(" OR "))),
                })
            }
        }
    }

    fn render_all(&self, items: &[Predicate], qualifier: Option<&str>, depth: usize) -> Result<Vec<String>> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            if let Some(sql) = self.render(item, qualifier, depth + 1)? {
                parts.push(sql);
            }
        }
        Ok(parts)
    }

    /// Quote a column reference. Dotted names are split and quoted segment
    /// by segment and never prefixed.
    pub fn column(&self, column: &str, qualifier: Option<&str>) -> String {
        if column.contains('.') {
            return self.dialect.quote_identifiers(column);
        }
        match qualifier {
            Some(q) => format!(
                "{}.{}",
                self.dialect.quote_identifiers(q),
                self.dialect.quote_identifier(column)
            ),
            None => self.dialect.quote_identifier(column),
        }
    }

    fn list(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items.iter().map(|v| self.dialect.escape(v)).collect(),
            single => vec![self.dialect.escape(single)],
        }
    }

    fn condition(&self, condition: &Condition, qualifier: Option<&str>) -> Result<Option<String>> {
        let key = self.column(&condition.column, qualifier);
        let dialect = self.dialect;
        let value = &condition.value;

        let sql = match (condition.op, value) {
            (Op::Eq | Op::Is, Value::Null) => format!("{key} IS NULL"),
            (Op::Ne | Op::Not, Value::Null) => format!("{key} IS NOT NULL"),
            (Op::Eq | Op::In, _) if matches!(value, Value::Array(_)) || condition.op == Op::In => {
                let items = self.list(value);
                if items.is_empty() {
                    // always false, keeps the statement valid
                    format!("{key} IN (NULL)")
                } else {
                    format!("{key} IN ({})", items.join(","))
                }
            }
            (Op::Ne | Op::NotIn, _) if matches!(value, Value::Array(_)) || condition.op == Op::NotIn => {
                let items = self.list(value);
                if items.is_empty() {
                    return Ok(None);
                }
                format!("{key} NOT IN ({})", items.join(","))
            }
            (Op::Eq, _) => format!("{key}={}", dialect.escape(value)),
            (Op::Between | Op::NotBetween, Value::Array(bounds)) if bounds.len() == 2 => format!(
                "{key} {} {} AND {}",
                condition.op.token(dialect),
                dialect.escape(&bounds[0]),
                dialect.escape(&bounds[1])
            ),
            (Op::Between | Op::NotBetween, _) => {
                return Err(invalid(format!(
                    "{} on \"{}\" needs exactly two bounds",
                    condition.op.token(dialect),
                    condition.column
                )));
            }
            (Op::Is | Op::Not, Value::Bool(b)) => format!(
                "{key} {} {}",
                condition.op.token(dialect),
                if *b { "TRUE" } else { "FALSE" }
            ),
            (Op::Is | Op::Not, other) => {
                return Err(invalid(format!(
                    "{} on \"{}\" accepts only NULL, true or false, got {}",
                    condition.op.token(dialect),
                    condition.column,
                    other.type_name()
                )));
            }
            (op, _) => format!("{key} {} {}", op.token(dialect), dialect.escape(value)),
        };
        Ok(Some(sql))
    }
}
