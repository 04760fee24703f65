//! Dialect query generators for relmodel.
//!
//! `relmodel-schema` provides:
//!
//! - [`QueryGenerator`]: one interface over DDL, DML and SELECT statements,
//!   implemented by [`MysqlQueryGenerator`], [`PostgresQueryGenerator`] and
//!   [`SqliteQueryGenerator`]
//! - [`generator_for_dialect`] to pick an implementation at runtime
//! - Index statements with the default `<table>_<field>...` naming
//!
//! # Example
//!
//! ```ignore
//! let generator = generator_for_dialect(Dialect::Mysql, GeneratorOptions::default());
//! let sql = generator.add_index("User", &IndexDefinition::new(["username", "isAdmin"]))?;
//! assert_eq!(sql, "CREATE INDEX `user_username_is_admin` ON `User` (`username`, `isAdmin`)");
//! ```

pub mod ddl;
pub mod generator;
pub mod index;

pub use ddl::{ColumnContext, DropTableOptions};
pub use generator::{
    MysqlQueryGenerator, PostgresQueryGenerator, QueryGenerator, SqliteQueryGenerator,
    generator_for_dialect,
};
pub use index::{IndexTarget, add_index_query, index_name, remove_index_query, show_indexes_query};
