//! Per-call query options.

use crate::where_clause::Predicate;
use relmodel_core::SortOrder;

/// One entry of the selected column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// A column, quoted on output
    Column(String),
    /// `expr AS alias`; the expression is emitted verbatim
    Aliased { expr: String, alias: String },
    /// Emitted verbatim
    Raw(String),
}

impl Attribute {
    pub fn aliased(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Attribute::Aliased {
            expr: expr.into(),
            alias: alias.into(),
        }
    }
}

impl From<&str> for Attribute {
    fn from(column: &str) -> Self {
        Attribute::Column(column.to_string())
    }
}

impl From<String> for Attribute {
    fn from(column: String) -> Self {
        Attribute::Column(column)
    }
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderItem {
    Column { column: String, direction: SortOrder },
    Raw(String),
}

impl OrderItem {
    pub fn asc(column: impl Into<String>) -> Self {
        OrderItem::Column {
            column: column.into(),
            direction: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        OrderItem::Column {
            column: column.into(),
            direction: SortOrder::Desc,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        OrderItem::Raw(sql.into())
    }
}

/// GROUP BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupItem {
    Column(String),
    Raw(String),
}

impl From<&str> for GroupItem {
    fn from(column: &str) -> Self {
        GroupItem::Column(column.to_string())
    }
}

/// Eager-load request for one association.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Include {
    /// Alias of the association on the parent model
    pub association: String,
    /// Target columns; all attributes of the target when `None`
    pub attributes: Option<Vec<String>>,
    /// Extra conditions on the included rows
    pub where_clause: Predicate,
    /// INNER instead of LEFT OUTER JOIN. Defaults to whether `where_clause`
    /// is non-empty.
    pub required: Option<bool>,
    /// Per-parent row cap for HasMany and BelongsToMany
    pub limit: Option<u64>,
    pub order: Vec<OrderItem>,
    pub include: Vec<Include>,
}

impl Include {
    pub fn new(association: impl Into<String>) -> Self {
        Self {
            association: association.into(),
            ..Self::default()
        }
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn where_clause(mut self, predicate: Predicate) -> Self {
        self.where_clause = predicate;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, item: OrderItem) -> Self {
        self.order.push(item);
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or_else(|| !self.where_clause.is_empty())
    }
}

/// Options of a SELECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Selected columns; `*` (or every model column with includes) when `None`
    pub attributes: Option<Vec<Attribute>>,
    pub where_clause: Predicate,
    pub include: Vec<Include>,
    pub group: Vec<GroupItem>,
    pub having: Predicate,
    pub order: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Schema the table lives in
    pub schema: Option<String>,
    /// Rows are consumed as-is rather than hydrated into nested instances.
    /// Has no effect on the generated SQL.
    pub raw: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes<I, A>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn where_clause(mut self, predicate: Predicate) -> Self {
        self.where_clause = predicate;
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }

    pub fn group(mut self, item: impl Into<GroupItem>) -> Self {
        self.group.push(item.into());
        self
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = predicate;
        self
    }

    pub fn order(mut self, item: OrderItem) -> Self {
        self.order.push(item);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Table reference, schema-qualified when a schema is set.
    pub fn table_ref(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }
}
