//! Convenient imports for typical `querykit` usage.
//!
//! ```ignore
//! use querykit::prelude::*;
//! ```

pub use crate::{
    Brackets, ColumnOptions, DataSource, DataSourceOptions, EntityMetadata, Filter, MutationQb,
    Order, OrmResult, QueryError, Row, SqlQb, Value, WhereExpression, WhereInput,
};

#[cfg(feature = "pool")]
pub use crate::PostgresDriver;

#[cfg(feature = "sqlite")]
pub use crate::SqliteDriver;
