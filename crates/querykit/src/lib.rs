//! # querykit
//!
//! A composable, multi-dialect SQL query builder with transactional execution
//! and entity lifecycle hooks.
//!
//! ## Features
//!
//! - **Fluent builders**: DELETE, UPDATE, INSERT and SELECT built from a [`DataSource`]
//! - **Named parameters**: `:name` / `:...name` in fragments, rewritten per dialect
//! - **Dialect descriptors**: quoting, placeholders, RETURNING vs OUTPUT and
//!   paging syntax for PostgreSQL, SQLite, MySQL and SQL Server
//! - **Transaction-friendly**: a builder opens and commits its own transaction
//!   only when none is active on the runner it uses
//! - **Lifecycle hooks**: before/after subscribers for mapped entities, awaited
//!   together
//! - **Tracing**: statements and transaction transitions under the
//!   `querykit.sql` and `querykit.tx` targets
//!
//! ## Usage
//!
//! ```ignore
//! use querykit::prelude::*;
//!
//! let ds = DataSource::new(PostgresDriver::connect(&database_url, 16)?).with_metadata(
//!     EntityMetadata::builder("Category")
//!         .table("category")
//!         .primary_column("id", ColumnOptions::new().column_type("integer"))
//!         .column("name", ColumnOptions::new().column_type("varchar"))
//!         .build()?,
//! );
//!
//! let result = ds
//!     .delete()
//!     .from("Category")
//!     .where_(Filter::new().eq("name", "Category #1"))
//!     .execute()
//!     .await?;
//! assert_eq!(result.affected, Some(1));
//! ```

pub mod config;
pub mod data_source;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod metadata;
pub mod prelude;
pub mod qb;
pub mod row;
pub mod subscriber;
pub mod value;

pub use config::{DataSourceOptions, LoggingOptions};
pub use data_source::DataSource;
pub use dialect::{Dialect, LimitStyle, PlaceholderStyle, ReturningPlacement};
pub use driver::{Driver, QueryRunner, RawResult};
pub use error::{OrmResult, QueryError};
pub use metadata::{ColumnMetadata, ColumnOptions, EntityMetadata, Generation, MetadataRegistry};
pub use row::Row;
pub use subscriber::{Broadcaster, BroadcasterResult, EntityEvent, EntitySubscriber, EventKind};
pub use value::{FromValue, Value};

pub use qb::{
    Brackets, CompiledQuery, DeleteQueryBuilder, DeleteResult, Filter, InsertQueryBuilder,
    InsertResult, MutationQb, Order, SelectQueryBuilder, SqlQb, UpdateQueryBuilder, UpdateResult,
    WhereExpression, WhereInput,
};

#[cfg(feature = "pool")]
pub use driver::postgres::PostgresDriver;

#[cfg(feature = "sqlite")]
pub use driver::sqlite::SqliteDriver;
