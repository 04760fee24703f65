//! Generator configuration.

use crate::dialect::Dialect;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How per-parent limits on eager-loaded collections are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupedLimitStrategy {
    /// Window functions where the dialect has them, UNION ALL otherwise
    #[default]
    Auto,
    /// One derived table per parent key joined with `UNION ALL`
    Union,
    /// `ROW_NUMBER() OVER (PARTITION BY ...)`
    Window,
    /// One statement per parent key
    Separate,
}

impl GroupedLimitStrategy {
    /// Resolve against a dialect. `Auto` picks `Window` where window
    /// functions exist; `Window` falls back to `Union` where they don't.
    pub fn resolve(self, dialect: Dialect) -> Self {
        match self {
            GroupedLimitStrategy::Auto | GroupedLimitStrategy::Window
                if dialect.supports_window_functions() =>
            {
                GroupedLimitStrategy::Window
            }
            GroupedLimitStrategy::Auto => GroupedLimitStrategy::Union,
            GroupedLimitStrategy::Window => {
                tracing::debug!(dialect = %dialect, "No window functions; using UNION ALL for grouped limits");
                GroupedLimitStrategy::Union
            }
            other => other,
        }
    }
}

/// Options shared by every statement a generator produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorOptions {
    pub dialect: Dialect,
    /// Drop NULL values from INSERT and UPDATE column lists
    pub omit_null: bool,
    /// MySQL storage engine
    pub engine: String,
    /// MySQL default character set
    pub charset: Option<String>,
    /// MySQL collation
    pub collate: Option<String>,
    /// MySQL row format
    pub row_format: Option<String>,
    pub grouped_limit_strategy: GroupedLimitStrategy,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            omit_null: false,
            engine: "InnoDB".to_string(),
            charset: None,
            collate: None,
            row_format: None,
            grouped_limit_strategy: GroupedLimitStrategy::Auto,
        }
    }
}

impl GeneratorOptions {
    /// Default options for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Load options from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options = serde_json::from_str(json)?;
        Ok(options)
    }

    pub fn omit_null(mut self, omit: bool) -> Self {
        self.omit_null = omit;
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn collate(mut self, collate: impl Into<String>) -> Self {
        self.collate = Some(collate.into());
        self
    }

    pub fn row_format(mut self, row_format: impl Into<String>) -> Self {
        self.row_format = Some(row_format.into());
        self
    }

    pub fn grouped_limit_strategy(mut self, strategy: GroupedLimitStrategy) -> Self {
        self.grouped_limit_strategy = strategy;
        self
    }

    /// The grouped-limit strategy with `Auto` resolved for this dialect.
    pub fn effective_grouped_limit_strategy(&self) -> GroupedLimitStrategy {
        self.grouped_limit_strategy.resolve(self.dialect)
    }
}
