use super::compiler::{self, CompiledQuery};
use super::expression_map::{Alias, ExpressionMap, QueryType, WhereType};
use super::where_expr::{IdValue, WhereInput, WhereScope};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::driver::QueryRunner;
use crate::error::OrmResult;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// State shared by every statement builder.
#[derive(Clone)]
pub struct QueryBuilder {
    pub(crate) data_source: DataSource,
    pub(crate) query_runner: Option<Arc<dyn QueryRunner>>,
    pub(crate) expression_map: ExpressionMap,
}

impl QueryBuilder {
    pub(crate) fn new(data_source: DataSource, query_type: QueryType) -> Self {
        let mut expression_map = ExpressionMap::new(query_type);
        expression_map.use_transaction =
            query_type != QueryType::Select && data_source.options().use_transaction_by_default;
        Self {
            data_source,
            query_runner: None,
            expression_map,
        }
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.data_source.dialect()
    }

    pub fn expression_map(&self) -> &ExpressionMap {
        &self.expression_map
    }

    /// Resolve a target (entity or table name) into an alias.
    pub(crate) fn create_alias(&self, target: &str, alias: Option<&str>) -> Alias {
        let metadata = self.data_source.metadata().find(target);
        let table_name = metadata
            .as_ref()
            .map_or_else(|| target.to_string(), |m| m.table_name().to_string());
        let name = match (alias, &metadata) {
            (Some(alias), _) => alias.to_string(),
            (None, Some(m)) => m.name().to_string(),
            (None, None) => target.to_string(),
        };
        Alias {
            name,
            table_name,
            metadata,
        }
    }

    pub(crate) fn set_main_target(&mut self, target: &str, alias: Option<&str>) {
        let alias = self.create_alias(target, alias);
        self.expression_map.set_main_alias(alias);
    }

    /// Database column name for a property of the main target.
    pub(crate) fn database_column(&self, property: &str) -> String {
        self.expression_map
            .main_alias
            .as_ref()
            .and_then(|a| a.metadata.as_ref())
            .and_then(|m| m.find_column(property))
            .map_or_else(|| property.to_string(), |c| c.database_name.clone())
    }

    /// Bind `value` under a generated name and return its `:name` reference.
    pub(crate) fn value_fragment(&mut self, column: &str, value: Value) -> String {
        format!(":{}", self.expression_map.create_parameter(column, value))
    }

    pub(crate) fn push_where(&mut self, kind: WhereType, input: WhereInput) {
        let dialect = self.data_source.dialect();
        WhereScope::new(&mut self.expression_map, dialect).push(kind, input);
    }

    pub(crate) fn push_where_in_ids(&mut self, kind: WhereType, ids: Vec<IdValue>) {
        let dialect = self.data_source.dialect();
        WhereScope::new(&mut self.expression_map, dialect).push_ids(kind, ids);
    }

    pub fn compile(&self) -> OrmResult<CompiledQuery> {
        compiler::compile(&self.expression_map, self.dialect())
    }

    pub fn get_query(&self) -> OrmResult<String> {
        compiler::render(&self.expression_map, self.dialect())
    }
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("dialect", &self.dialect().name())
            .field("borrowed_runner", &self.query_runner.is_some())
            .field("expression_map", &self.expression_map)
            .finish()
    }
}
