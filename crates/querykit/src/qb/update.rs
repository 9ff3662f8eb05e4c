//! UPDATE query builder.

use super::builder::QueryBuilder;
use super::execute::{self, Lifecycle};
use super::expression_map::QueryType;
use super::result::UpdateResult;
use super::traits::{MutationQb, SqlQb, WhereExpression};
use crate::data_source::DataSource;
use crate::error::OrmResult;
use crate::value::Value;

/// UPDATE query builder.
#[derive(Debug, Clone)]
pub struct UpdateQueryBuilder {
    qb: QueryBuilder,
}

impl UpdateQueryBuilder {
    pub(crate) fn new(data_source: DataSource) -> Self {
        Self {
            qb: QueryBuilder::new(data_source, QueryType::Update),
        }
    }

    /// Set the target entity or table.
    pub fn table(mut self, target: &str) -> Self {
        self.qb.set_main_target(target, None);
        self
    }

    /// Assign a bound value. Property names are mapped to column names.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let column = self.qb.database_column(column);
        let fragment = self.qb.value_fragment(&column, value.into());
        self.qb.expression_map.set.insert(column, fragment);
        self
    }

    /// Assign a raw SQL expression, e.g. `set_raw("version", "version + 1")`.
    pub fn set_raw(mut self, column: &str, sql: impl Into<String>) -> Self {
        let column = self.qb.database_column(column);
        self.qb.expression_map.set.insert(column, sql.into());
        self
    }

    /// Assign several bound values.
    pub fn set_values<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        values
            .into_iter()
            .fold(self, |qb, (column, value)| qb.set(column.as_ref(), value))
    }

    /// Execute the UPDATE, firing update hooks for mapped entities.
    pub async fn execute(&self) -> OrmResult<UpdateResult> {
        execute::execute(&self.qb, Some(Lifecycle::UPDATE))
            .await
            .map(UpdateResult::from_outcome)
    }
}

impl SqlQb for UpdateQueryBuilder {
    fn query_builder(&self) -> &QueryBuilder {
        &self.qb
    }

    fn query_builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.qb
    }
}

impl WhereExpression for UpdateQueryBuilder {}

impl MutationQb for UpdateQueryBuilder {}
