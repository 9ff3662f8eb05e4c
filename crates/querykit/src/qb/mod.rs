//! Statement builders.
//!
//! Every builder owns an [`ExpressionMap`] describing the statement. Fluent
//! calls mutate the map, the [`compiler`] renders it for the data source's
//! dialect and the executor runs it with transaction and hook handling.
//!
//! # Features
//!
//! - **Named parameters**: fragments reference `:name` (or `:...name` to
//!   spread an array); the compiler rewrites them into `$n`, `?`, `@Pn` or
//!   `:name` depending on the dialect
//! - **Flexible predicates**: raw fragments, [`Filter`]s, [`Brackets`] groups,
//!   callbacks and primary-key lookups via `where_in_ids`
//! - **RETURNING / OUTPUT**: rendered where the dialect puts it, rejected at
//!   compile time where it has no support
//!
//! # Usage
//!
//! ```ignore
//! use querykit::prelude::*;
//!
//! // DELETE
//! ds.delete()
//!     .from("Category")
//!     .where_("name = :name")
//!     .set_parameter("name", "Category #1")
//!     .execute()
//!     .await?;
//!
//! // UPDATE
//! ds.update("Category")
//!     .set("name", "Renamed")
//!     .where_in_ids(7)
//!     .execute()
//!     .await?;
//!
//! // INSERT
//! ds.insert()
//!     .into("Category")
//!     .values([("name", "Books")])
//!     .returning(["id"])
//!     .execute()
//!     .await?;
//!
//! // SELECT
//! let rows = ds
//!     .select(["c.id", "c.name"])
//!     .from("Category", "c")
//!     .where_(Filter::new().eq("name", "Books"))
//!     .get_many()
//!     .await?;
//! ```

mod builder;
pub mod compiler;
mod delete;
mod execute;
mod expression_map;
mod insert;
mod result;
mod select;
mod traits;
mod update;
mod where_expr;

pub use builder::QueryBuilder;
pub use compiler::CompiledQuery;
pub use delete::DeleteQueryBuilder;
pub use expression_map::{
    Alias, ExpressionMap, JoinAttribute, JoinType, Order, QueryType, Returning, WhereClause,
    WhereType,
};
pub use insert::InsertQueryBuilder;
pub use result::{DeleteResult, InsertResult, UpdateResult};
pub use select::SelectQueryBuilder;
pub use traits::{MutationQb, SqlQb, WhereExpression};
pub use update::UpdateQueryBuilder;
pub use where_expr::{Brackets, Filter, IdValue, IntoIds, WhereInput, WhereScope};
