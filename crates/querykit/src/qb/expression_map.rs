//! Structural description of one query under construction.

use crate::error::QueryError;
use crate::metadata::EntityMetadata;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Statement family of a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

/// The target of a query (or of a join) and the alias it is referenced by.
#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub table_name: String,
    pub metadata: Option<Arc<EntityMetadata>>,
}

impl Alias {
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }
}

/// How a WHERE entry combines with the entries before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereType {
    Simple,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub kind: WhereType,
    pub condition: String,
}

/// Requested RETURNING/OUTPUT clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returning {
    Columns(Vec<String>),
    Raw(String),
}

impl From<&str> for Returning {
    fn from(sql: &str) -> Self {
        Returning::Raw(sql.to_string())
    }
}

impl From<String> for Returning {
    fn from(sql: String) -> Self {
        Returning::Raw(sql)
    }
}

impl From<Vec<String>> for Returning {
    fn from(cols: Vec<String>) -> Self {
        Returning::Columns(cols)
    }
}

impl From<Vec<&str>> for Returning {
    fn from(cols: Vec<&str>) -> Self {
        Returning::Columns(cols.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Returning {
    fn from(cols: [&str; N]) -> Self {
        Returning::Columns(cols.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Returning {
    fn from(cols: &[&str]) -> Self {
        Returning::Columns(cols.iter().map(|c| c.to_string()).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
pub struct JoinAttribute {
    pub kind: JoinType,
    pub alias: Alias,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Errors detected while a fluent chain is still running.
///
/// Fluent methods cannot return `Result`, so the first such error is kept here
/// and reported when the query is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeferredError {
    MissingPrimaryColumns(String),
    IncompleteId { entity: String, column: String },
}

impl From<DeferredError> for QueryError {
    fn from(err: DeferredError) -> Self {
        match err {
            DeferredError::MissingPrimaryColumns(entity) => QueryError::MissingPrimaryColumns(entity),
            DeferredError::IncompleteId { entity, column } => {
                QueryError::IncompleteId { entity, column }
            }
        }
    }
}

/// Mutable model of one query. Owned by exactly one builder.
#[derive(Debug, Clone)]
pub struct ExpressionMap {
    pub query_type: QueryType,
    pub main_alias: Option<Alias>,
    /// Selected column paths or raw expressions (SELECT).
    pub selects: Vec<String>,
    /// Column → SQL fragment, usually a `:param` reference (UPDATE).
    pub set: IndexMap<String, String>,
    /// Rows of column → SQL fragment (INSERT).
    pub value_rows: Vec<IndexMap<String, String>>,
    pub wheres: Vec<WhereClause>,
    pub joins: Vec<JoinAttribute>,
    pub order_bys: IndexMap<String, Order>,
    pub group_bys: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub returning: Option<Returning>,
    pub parameters: IndexMap<String, Value>,
    pub use_transaction: bool,
    pub call_listeners: bool,
    pub alias_name_prefixing_enabled: bool,
    parameter_index: usize,
    pub(crate) deferred_error: Option<DeferredError>,
}

impl ExpressionMap {
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            main_alias: None,
            selects: Vec::new(),
            set: IndexMap::new(),
            value_rows: Vec::new(),
            wheres: Vec::new(),
            joins: Vec::new(),
            order_bys: IndexMap::new(),
            group_bys: Vec::new(),
            limit: None,
            offset: None,
            returning: None,
            parameters: IndexMap::new(),
            use_transaction: false,
            call_listeners: true,
            alias_name_prefixing_enabled: query_type == QueryType::Select,
            parameter_index: 0,
            deferred_error: None,
        }
    }

    pub fn set_main_alias(&mut self, alias: Alias) {
        self.main_alias = Some(alias);
    }

    /// Metadata of the main alias when lifecycle listeners should fire.
    pub fn listener_metadata(&self) -> Option<&Arc<EntityMetadata>> {
        if !self.call_listeners {
            return None;
        }
        self.main_alias.as_ref()?.metadata.as_ref()
    }

    /// Bind a named parameter, replacing any previous value for the name.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Bind a value under a freshly generated unique name and return the name.
    pub fn create_parameter(&mut self, hint: &str, value: impl Into<Value>) -> String {
        let mut base: String = hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert_str(0, "p_");
        }
        let name = loop {
            let candidate = format!("{}_{}", base, self.parameter_index);
            self.parameter_index += 1;
            if !self.parameters.contains_key(&candidate) {
                break candidate;
            }
        };
        self.parameters.insert(name.clone(), value.into());
        name
    }

    pub(crate) fn defer_error(&mut self, err: DeferredError) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixing_only_for_select() {
        assert!(ExpressionMap::new(QueryType::Select).alias_name_prefixing_enabled);
        assert!(!ExpressionMap::new(QueryType::Delete).alias_name_prefixing_enabled);
        assert!(!ExpressionMap::new(QueryType::Update).alias_name_prefixing_enabled);
        assert!(!ExpressionMap::new(QueryType::Insert).alias_name_prefixing_enabled);
    }

    #[test]
    fn generated_parameter_names_are_unique() {
        let mut map = ExpressionMap::new(QueryType::Delete);
        map.set_parameter("name_0", "taken");
        let a = map.create_parameter("name", "x");
        let b = map.create_parameter("name", "y");
        assert_ne!(a, b);
        assert_ne!(a, "name_0");
        assert_eq!(map.parameters.len(), 3);
    }

    #[test]
    fn generated_parameter_names_are_sanitized() {
        let mut map = ExpressionMap::new(QueryType::Delete);
        assert_eq!(map.create_parameter("c.name", 1), "c_name_0");
        assert_eq!(map.create_parameter("1st", 1), "p_1st_1");
    }

    #[test]
    fn set_parameter_overwrites() {
        let mut map = ExpressionMap::new(QueryType::Delete);
        map.set_parameter("id", 1);
        map.set_parameter("id", 2);
        assert_eq!(map.parameters.get("id"), Some(&Value::Int(2)));
    }
}
