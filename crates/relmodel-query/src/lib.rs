//! Query generation for relmodel.
//!
//! `relmodel-query` turns structured options into SQL text. Everything here is
//! a pure function of its inputs and a [`Dialect`](relmodel_core::Dialect):
//!
//! - **Where-clause compiler**: [`Predicate`] trees, built in code or parsed
//!   from JSON, compiled by [`WhereCompiler`].
//! - **Join planner**: [`JoinPlanner`] turns includes into aliased JOINs, and
//!   per-parent limits into [`GroupedLimitPlan`]s with result stitching.
//! - **Statements**: [`select_query`], [`find_query`] and the INSERT/UPDATE/
//!   DELETE builders in [`dml`].
//! - **Accessors**: capability traits producing the statements behind
//!   association accessors such as `getTasks` or `addTag`.

pub mod accessors;
pub mod dml;
pub mod grouped;
pub mod join;
pub mod options;
pub mod select;
pub mod where_clause;

pub use accessors::{
    AccessorStatement, Accessors, Addable, Checkable, Countable, Creatable, Gettable, HasMany,
    HasOne, Removable, Settable,
};
pub use dml::{
    DeleteOptions, InsertOptions, Returning, TruncateOptions, UpdateOptions, bulk_insert_query,
    delete_query, insert_query, truncate_query, update_query,
};
pub use grouped::{GroupedLimitPlan, GroupedRows};
pub use join::{AliasedColumn, ColumnRef, Join, JoinPlan, JoinPlanner, JoinType};
pub use options::{Attribute, FindOptions, GroupItem, Include, OrderItem};
pub use select::{FindQuery, find_query, select_query, select_with_joins};
pub use where_clause::{Condition, Op, Predicate, WhereCompiler};
