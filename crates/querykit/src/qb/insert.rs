//! INSERT query builder.

use super::builder::QueryBuilder;
use super::execute::{self, Lifecycle};
use super::expression_map::QueryType;
use super::result::InsertResult;
use super::traits::{MutationQb, SqlQb};
use crate::data_source::DataSource;
use crate::error::OrmResult;
use crate::value::Value;
use indexmap::IndexMap;

/// INSERT query builder.
///
/// Each `values` call appends one row. Columns missing from a row are
/// filled with the dialect's default keyword.
///
/// ```ignore
/// ds.insert()
///     .into("Category")
///     .values([("name", "Books")])
///     .values([("name", "Music")])
///     .returning(["id"])
///     .execute()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct InsertQueryBuilder {
    qb: QueryBuilder,
}

impl InsertQueryBuilder {
    pub(crate) fn new(data_source: DataSource) -> Self {
        Self {
            qb: QueryBuilder::new(data_source, QueryType::Insert),
        }
    }

    /// Set the target entity or table. Call before `values` so property
    /// names resolve to column names.
    pub fn into(mut self, target: &str) -> Self {
        self.qb.set_main_target(target, None);
        self
    }

    /// Append one row.
    pub fn values<I, K, V>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut fragments = IndexMap::new();
        for (column, value) in row {
            let column = self.qb.database_column(column.as_ref());
            let fragment = self.qb.value_fragment(&column, value.into());
            fragments.insert(column, fragment);
        }
        self.qb.expression_map.value_rows.push(fragments);
        self
    }

    /// Append several rows.
    pub fn rows<R, I, K, V>(self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        rows.into_iter().fold(self, |qb, row| qb.values(row))
    }

    /// Execute the INSERT, firing insert hooks for mapped entities.
    pub async fn execute(&self) -> OrmResult<InsertResult> {
        execute::execute(&self.qb, Some(Lifecycle::INSERT))
            .await
            .map(InsertResult::from_outcome)
    }
}

impl SqlQb for InsertQueryBuilder {
    fn query_builder(&self) -> &QueryBuilder {
        &self.qb
    }

    fn query_builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.qb
    }
}

impl MutationQb for InsertQueryBuilder {}
