//! Trait definitions shared by the statement builders.

use super::builder::QueryBuilder;
use super::expression_map::{ExpressionMap, Returning, WhereType};
use super::where_expr::{IntoIds, WhereInput};
use crate::driver::QueryRunner;
use crate::error::OrmResult;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Base trait for all query builders.
pub trait SqlQb: Sized {
    #[doc(hidden)]
    fn query_builder(&self) -> &QueryBuilder;

    #[doc(hidden)]
    fn query_builder_mut(&mut self) -> &mut QueryBuilder;

    fn expression_map(&self) -> &ExpressionMap {
        &self.query_builder().expression_map
    }

    /// SQL with named `:param` placeholders still in place.
    fn get_query(&self) -> OrmResult<String> {
        self.query_builder().get_query()
    }

    /// Final SQL and positional parameters for the data source's dialect.
    fn get_query_and_parameters(&self) -> OrmResult<(String, Vec<Value>)> {
        let compiled = self.query_builder().compile()?;
        Ok((compiled.sql, compiled.parameters))
    }

    /// Debug helper: the final SQL, or the compile error.
    fn to_sql(&self) -> String {
        match self.query_builder().compile() {
            Ok(compiled) => compiled.sql,
            Err(err) => format!("<{err}>"),
        }
    }

    fn get_parameters(&self) -> &IndexMap<String, Value> {
        &self.query_builder().expression_map.parameters
    }

    fn set_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_builder_mut()
            .expression_map
            .set_parameter(name, value);
        self
    }

    /// Merge parameters; later values win.
    fn set_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let map = &mut self.query_builder_mut().expression_map;
        for (name, value) in parameters {
            map.set_parameter(name, value);
        }
        self
    }

    /// Execute on a caller-owned runner. The builder never commits, rolls
    /// back or releases it.
    fn with_query_runner(mut self, runner: Arc<dyn QueryRunner>) -> Self {
        self.query_builder_mut().query_runner = Some(runner);
        self
    }
}

/// WHERE clause construction.
///
/// `where_` replaces the predicate list (parameters are kept), `and_where` and
/// `or_where` append to it.
pub trait WhereExpression: SqlQb {
    fn where_(mut self, input: impl Into<WhereInput>) -> Self {
        self.query_builder_mut()
            .push_where(WhereType::Simple, input.into());
        self
    }

    fn and_where(mut self, input: impl Into<WhereInput>) -> Self {
        self.query_builder_mut()
            .push_where(WhereType::And, input.into());
        self
    }

    fn or_where(mut self, input: impl Into<WhereInput>) -> Self {
        self.query_builder_mut()
            .push_where(WhereType::Or, input.into());
        self
    }

    /// `where_` plus parameters in one call.
    fn where_with<I, K, V>(self, input: impl Into<WhereInput>, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.where_(input).set_parameters(parameters)
    }

    fn and_where_with<I, K, V>(self, input: impl Into<WhereInput>, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.and_where(input).set_parameters(parameters)
    }

    fn or_where_with<I, K, V>(self, input: impl Into<WhereInput>, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.or_where(input).set_parameters(parameters)
    }

    /// Match rows by primary key. An empty list matches nothing.
    fn where_in_ids(mut self, ids: impl IntoIds) -> Self {
        self.query_builder_mut()
            .push_where_in_ids(WhereType::Simple, ids.into_ids());
        self
    }

    fn and_where_in_ids(mut self, ids: impl IntoIds) -> Self {
        self.query_builder_mut()
            .push_where_in_ids(WhereType::And, ids.into_ids());
        self
    }

    fn or_where_in_ids(mut self, ids: impl IntoIds) -> Self {
        self.query_builder_mut()
            .push_where_in_ids(WhereType::Or, ids.into_ids());
        self
    }
}

/// Trait for mutation builders (INSERT/UPDATE/DELETE).
pub trait MutationQb: SqlQb {
    /// Wrap execution in a transaction unless one is already active on the runner.
    fn use_transaction(mut self, enabled: bool) -> Self {
        self.query_builder_mut().expression_map.use_transaction = enabled;
        self
    }

    /// Fire entity lifecycle hooks (default `true`).
    fn call_listeners(mut self, enabled: bool) -> Self {
        self.query_builder_mut().expression_map.call_listeners = enabled;
        self
    }

    /// Request a RETURNING (or OUTPUT) clause: column names or a raw fragment.
    ///
    /// Compilation fails on dialects without support, even for an empty
    /// column list. On other dialects an empty list renders no clause.
    fn returning(mut self, returning: impl Into<Returning>) -> Self {
        let qb = self.query_builder_mut();
        let returning = match returning.into() {
            Returning::Columns(columns) => {
                Returning::Columns(columns.iter().map(|c| qb.database_column(c)).collect())
            }
            raw @ Returning::Raw(_) => raw,
        };
        qb.expression_map.returning = Some(returning);
        self
    }

    /// Same as [`MutationQb::returning`], named after SQL Server's clause.
    fn output(self, output: impl Into<Returning>) -> Self {
        self.returning(output)
    }
}
