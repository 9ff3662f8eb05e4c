//! SELECT query builder.

use super::builder::QueryBuilder;
use super::execute;
use super::expression_map::{JoinAttribute, JoinType, Order, QueryType};
use super::traits::{SqlQb, WhereExpression};
use crate::data_source::DataSource;
use crate::error::OrmResult;
use crate::row::Row;

/// SELECT query builder.
///
/// Filter keys are prefixed with the main alias, so joins stay unambiguous.
///
/// ```ignore
/// let rows = ds
///     .select(["c.id", "c.name"])
///     .from("Category", "c")
///     .left_join("post", "p", "p.category_id = c.id")
///     .where_(Filter::new().eq("name", "Books"))
///     .order_by("c.id", Order::Desc)
///     .limit(10)
///     .get_many()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SelectQueryBuilder {
    qb: QueryBuilder,
}

impl SelectQueryBuilder {
    pub(crate) fn new(data_source: DataSource) -> Self {
        Self {
            qb: QueryBuilder::new(data_source, QueryType::Select),
        }
    }

    /// Replace the selected columns. Empty selects `*`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qb.expression_map.selects = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_select(mut self, column: impl Into<String>) -> Self {
        self.qb.expression_map.selects.push(column.into());
        self
    }

    pub fn from(mut self, target: &str, alias: &str) -> Self {
        self.qb.set_main_target(target, Some(alias));
        self
    }

    pub fn inner_join(self, target: &str, alias: &str, condition: impl Into<String>) -> Self {
        self.join(JoinType::Inner, target, alias, Some(condition.into()))
    }

    pub fn left_join(self, target: &str, alias: &str, condition: impl Into<String>) -> Self {
        self.join(JoinType::Left, target, alias, Some(condition.into()))
    }

    fn join(mut self, kind: JoinType, target: &str, alias: &str, condition: Option<String>) -> Self {
        let alias = self.qb.create_alias(target, Some(alias));
        self.qb.expression_map.joins.push(JoinAttribute {
            kind,
            alias,
            condition,
        });
        self
    }

    /// Replace the ordering.
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.qb.expression_map.order_bys.clear();
        self.qb.expression_map.order_bys.insert(column.into(), order);
        self
    }

    pub fn add_order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.qb.expression_map.order_bys.insert(column.into(), order);
        self
    }

    /// Replace the grouping.
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.qb.expression_map.group_bys = vec![column.into()];
        self
    }

    pub fn add_group_by(mut self, column: impl Into<String>) -> Self {
        self.qb.expression_map.group_bys.push(column.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.qb.expression_map.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.qb.expression_map.offset = Some(offset);
        self
    }

    /// Execute and return all rows.
    pub async fn get_many(&self) -> OrmResult<Vec<Row>> {
        let outcome = execute::execute(&self.qb, None).await?;
        Ok(outcome.raw.unwrap_or_default())
    }

    /// Execute and return the first row, if any.
    pub async fn get_one(&self) -> OrmResult<Option<Row>> {
        Ok(self.get_many().await?.into_iter().next())
    }
}

impl SqlQb for SelectQueryBuilder {
    fn query_builder(&self) -> &QueryBuilder {
        &self.qb
    }

    fn query_builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.qb
    }
}

impl WhereExpression for SelectQueryBuilder {}
