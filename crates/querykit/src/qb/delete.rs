//! DELETE query builder.

use super::builder::QueryBuilder;
use super::execute::{self, Lifecycle};
use super::expression_map::QueryType;
use super::result::DeleteResult;
use super::traits::{MutationQb, SqlQb, WhereExpression};
use crate::data_source::DataSource;
use crate::error::OrmResult;

/// DELETE query builder.
///
/// ```ignore
/// let result = ds
///     .delete()
///     .from("Category")
///     .where_in_ids([1, 2, 3])
///     .returning(["id"])
///     .execute()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct DeleteQueryBuilder {
    qb: QueryBuilder,
}

impl DeleteQueryBuilder {
    pub(crate) fn new(data_source: DataSource) -> Self {
        Self {
            qb: QueryBuilder::new(data_source, QueryType::Delete),
        }
    }

    /// Set the target entity or table. A later call replaces the target.
    pub fn from(mut self, target: &str) -> Self {
        self.qb.set_main_target(target, None);
        self
    }

    /// Set the target under an explicit alias.
    pub fn from_as(mut self, target: &str, alias: &str) -> Self {
        self.qb.set_main_target(target, Some(alias));
        self
    }

    /// Execute the DELETE, firing remove hooks for mapped entities.
    pub async fn execute(&self) -> OrmResult<DeleteResult> {
        execute::execute(&self.qb, Some(Lifecycle::REMOVE))
            .await
            .map(DeleteResult::from_outcome)
    }
}

impl SqlQb for DeleteQueryBuilder {
    fn query_builder(&self) -> &QueryBuilder {
        &self.qb
    }

    fn query_builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.qb
    }
}

impl WhereExpression for DeleteQueryBuilder {}

impl MutationQb for DeleteQueryBuilder {}
