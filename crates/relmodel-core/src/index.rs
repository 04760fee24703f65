//! Index definitions attached to models and passed to `add_index`.

use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Index kind modifier placed before `INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexType {
    Unique,
    Fulltext,
    Spatial,
}

impl IndexType {
    pub const fn as_sql(self) -> &'static str {
        match self {
            IndexType::Unique => "UNIQUE",
            IndexType::Fulltext => "FULLTEXT",
            IndexType::Spatial => "SPATIAL",
        }
    }
}

/// One indexed column or expression.
///
/// `name` is the column; `attribute` is accepted as an alias of it. A field
/// carrying neither is rejected when the index is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub name: Option<String>,
    pub attribute: Option<String>,
    /// Prefix length (MySQL)
    pub length: Option<u32>,
    pub order: Option<SortOrder>,
    pub collate: Option<String>,
}

impl IndexField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn collate(mut self, collate: impl Into<String>) -> Self {
        self.collate = Some(collate.into());
        self
    }

    /// Column name, from `name` or `attribute`.
    pub fn column(&self) -> Option<&str> {
        self.name.as_deref().or(self.attribute.as_deref())
    }
}

impl From<&str> for IndexField {
    fn from(name: &str) -> Self {
        IndexField::new(name)
    }
}

impl From<String> for IndexField {
    fn from(name: String) -> Self {
        IndexField::new(name)
    }
}

/// A secondary index over one or more fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Explicit name; derived from table and fields when absent
    pub name: Option<String>,
    pub fields: Vec<IndexField>,
    pub index_type: Option<IndexType>,
    /// Index method (`BTREE`, `HASH`, `GIN`, ...)
    pub using: Option<String>,
    /// MySQL full-text parser
    pub parser: Option<String>,
    /// PostgreSQL `CREATE INDEX CONCURRENTLY`
    pub concurrently: bool,
    /// Partial index predicate, raw SQL (PostgreSQL and SQLite)
    pub where_clause: Option<String>,
}

impl IndexDefinition {
    pub fn new<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<IndexField>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.index_type = Some(IndexType::Unique);
        self
    }

    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = Some(index_type);
        self
    }

    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.using = Some(method.into());
        self
    }

    pub fn parser(mut self, parser: impl Into<String>) -> Self {
        self.parser = Some(parser.into());
        self
    }

    pub fn concurrently(mut self) -> Self {
        self.concurrently = true;
        self
    }

    pub fn where_clause(mut self, sql: impl Into<String>) -> Self {
        self.where_clause = Some(sql.into());
        self
    }

    pub fn is_unique(&self) -> bool {
        self.index_type == Some(IndexType::Unique)
    }
}
