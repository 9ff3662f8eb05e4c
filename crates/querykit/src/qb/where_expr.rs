//! Predicate inputs and the scope that turns them into WHERE fragments.

use super::compiler::fold_wheres;
use super::expression_map::{DeferredError, ExpressionMap, WhereClause, WhereType};
use crate::dialect::Dialect;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::mem;

/// Column → value equality filter.
///
/// Each entry renders as `col = :p`, `col IN (:...p)` for arrays or
/// `col IS NULL` for [`Value::Null`]; entries are joined with `AND`.
///
/// ```ignore
/// let filter = Filter::new().eq("name", "Category #1").eq("parent", Value::Null);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: IndexMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.get(column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Filter {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

type ScopeFn = Box<dyn FnOnce(&mut WhereScope<'_>) + Send>;
type CallbackFn = Box<dyn FnOnce(&mut WhereScope<'_>) -> String + Send>;

/// A parenthesised group of predicates built inside its own scope.
///
/// ```ignore
/// qb.where_("a = :a").and_where(Brackets::new(|qb| {
///     qb.where_("b = :b").or_where("c = :c");
/// }));
/// // WHERE a = :a AND (b = :b OR c = :c)
/// ```
pub struct Brackets {
    build: ScopeFn,
}

impl Brackets {
    pub fn new(build: impl FnOnce(&mut WhereScope<'_>) + Send + 'static) -> Self {
        Self {
            build: Box::new(build),
        }
    }
}

impl fmt::Debug for Brackets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Brackets(..)")
    }
}

/// Anything accepted by `where_`, `and_where` and `or_where`.
pub enum WhereInput {
    /// SQL fragment used verbatim. May reference `:name` parameters.
    Raw(String),
    Brackets(Brackets),
    /// Receives the scope (for parameters and quoting) and returns a fragment.
    Callback(CallbackFn),
    Filter(Filter),
    /// Disjunction of filters.
    Filters(Vec<Filter>),
}

impl WhereInput {
    pub fn callback(f: impl FnOnce(&mut WhereScope<'_>) -> String + Send + 'static) -> Self {
        WhereInput::Callback(Box::new(f))
    }
}

impl fmt::Debug for WhereInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereInput::Raw(sql) => f.debug_tuple("Raw").field(sql).finish(),
            WhereInput::Brackets(b) => b.fmt(f),
            WhereInput::Callback(_) => f.write_str("Callback(..)"),
            WhereInput::Filter(filter) => f.debug_tuple("Filter").field(filter).finish(),
            WhereInput::Filters(filters) => f.debug_tuple("Filters").field(filters).finish(),
        }
    }
}

impl From<&str> for WhereInput {
    fn from(sql: &str) -> Self {
        WhereInput::Raw(sql.to_string())
    }
}

impl From<String> for WhereInput {
    fn from(sql: String) -> Self {
        WhereInput::Raw(sql)
    }
}

impl From<Brackets> for WhereInput {
    fn from(brackets: Brackets) -> Self {
        WhereInput::Brackets(brackets)
    }
}

impl From<Filter> for WhereInput {
    fn from(filter: Filter) -> Self {
        WhereInput::Filter(filter)
    }
}

impl From<Vec<Filter>> for WhereInput {
    fn from(filters: Vec<Filter>) -> Self {
        WhereInput::Filters(filters)
    }
}

/// One identifier for `where_in_ids`.
#[derive(Debug, Clone, PartialEq)]
pub enum IdValue {
    /// Value of the single primary column.
    Scalar(Value),
    /// Primary column → value, required for composite keys.
    Map(Filter),
}

/// Conversion into a list of identifiers.
pub trait IntoIds {
    fn into_ids(self) -> Vec<IdValue>;
}

macro_rules! impl_into_ids {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoIds for $ty {
                fn into_ids(self) -> Vec<IdValue> {
                    vec![IdValue::Scalar(self.into())]
                }
            }

            impl IntoIds for Vec<$ty> {
                fn into_ids(self) -> Vec<IdValue> {
                    self.into_iter().map(|v| IdValue::Scalar(v.into())).collect()
                }
            }

            impl<const N: usize> IntoIds for [$ty; N] {
                fn into_ids(self) -> Vec<IdValue> {
                    self.into_iter().map(|v| IdValue::Scalar(v.into())).collect()
                }
            }

            impl IntoIds for &[$ty] {
                fn into_ids(self) -> Vec<IdValue> {
                    self.iter().cloned().map(|v| IdValue::Scalar(v.into())).collect()
                }
            }
        )*
    };
}

impl_into_ids!(i16, i32, i64, u32, String, &str, uuid::Uuid, Value);

impl IntoIds for Filter {
    fn into_ids(self) -> Vec<IdValue> {
        vec![IdValue::Map(self)]
    }
}

impl IntoIds for Vec<Filter> {
    fn into_ids(self) -> Vec<IdValue> {
        self.into_iter().map(IdValue::Map).collect()
    }
}

impl IntoIds for Vec<IdValue> {
    fn into_ids(self) -> Vec<IdValue> {
        self
    }
}

/// Mutable view over a query's predicate list.
///
/// The top-level builder methods and [`Brackets`] closures both work through a
/// scope. Inside a bracket group the scope's predicate list is the group's own
/// list, so `where_` there only resets the group.
pub struct WhereScope<'a> {
    map: &'a mut ExpressionMap,
    dialect: &'a dyn Dialect,
}

impl<'a> WhereScope<'a> {
    pub(crate) fn new(map: &'a mut ExpressionMap, dialect: &'a dyn Dialect) -> Self {
        Self { map, dialect }
    }

    pub fn where_(&mut self, input: impl Into<WhereInput>) -> &mut Self {
        self.push(WhereType::Simple, input.into());
        self
    }

    pub fn and_where(&mut self, input: impl Into<WhereInput>) -> &mut Self {
        self.push(WhereType::And, input.into());
        self
    }

    pub fn or_where(&mut self, input: impl Into<WhereInput>) -> &mut Self {
        self.push(WhereType::Or, input.into());
        self
    }

    pub fn where_in_ids(&mut self, ids: impl IntoIds) -> &mut Self {
        self.push_ids(WhereType::Simple, ids.into_ids());
        self
    }

    pub fn and_where_in_ids(&mut self, ids: impl IntoIds) -> &mut Self {
        self.push_ids(WhereType::And, ids.into_ids());
        self
    }

    pub fn or_where_in_ids(&mut self, ids: impl IntoIds) -> &mut Self {
        self.push_ids(WhereType::Or, ids.into_ids());
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.map.set_parameter(name, value);
        self
    }

    /// Bind `value` under a generated unique name and return the name.
    pub fn create_parameter(&mut self, hint: &str, value: impl Into<Value>) -> String {
        self.map.create_parameter(hint, value)
    }

    /// Quote an identifier or dotted path for the current dialect.
    pub fn escape(&self, path: &str) -> String {
        self.dialect.quote_path(path)
    }

    /// Alias of the main target, if `from` was called.
    pub fn alias(&self) -> Option<&str> {
        self.map.main_alias.as_ref().map(|a| a.name.as_str())
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect
    }

    pub(crate) fn push(&mut self, kind: WhereType, input: WhereInput) {
        let condition = self.compute_where_condition(input);
        self.append(kind, condition);
    }

    pub(crate) fn push_ids(&mut self, kind: WhereType, ids: Vec<IdValue>) {
        let condition = self.where_ids_condition(ids);
        self.append(kind, condition);
    }

    fn append(&mut self, kind: WhereType, condition: String) {
        if kind == WhereType::Simple {
            self.map.wheres.clear();
        }
        self.map.wheres.push(WhereClause { kind, condition });
    }

    /// Normalise one predicate input into a SQL fragment.
    pub fn compute_where_condition(&mut self, input: WhereInput) -> String {
        match input {
            WhereInput::Raw(sql) => sql,
            WhereInput::Callback(f) => f(self),
            WhereInput::Brackets(brackets) => {
                let outer = mem::take(&mut self.map.wheres);
                (brackets.build)(self);
                let inner = mem::replace(&mut self.map.wheres, outer);
                if inner.is_empty() {
                    "1=1".to_string()
                } else {
                    format!("({})", fold_wheres(&inner))
                }
            }
            WhereInput::Filter(filter) => self.filter_condition(&filter),
            WhereInput::Filters(filters) => match filters.len() {
                0 => "1=0".to_string(),
                1 => self.filter_condition(&filters[0]),
                _ => {
                    let terms: Vec<String> = filters
                        .iter()
                        .map(|filter| {
                            let condition = self.filter_condition(filter);
                            if filter.len() > 1 {
                                format!("({condition})")
                            } else {
                                condition
                            }
                        })
                        .collect();
                    format!("({})", terms.join(" OR "))
                }
            },
        }
    }

    fn filter_condition(&mut self, filter: &Filter) -> String {
        if filter.is_empty() {
            return "1=1".to_string();
        }
        let parts: Vec<String> = filter
            .iter()
            .map(|(key, value)| {
                let column = self.column_reference(key);
                match value {
                    Value::Null => format!("{column} IS NULL"),
                    Value::Array(items) if items.is_empty() => "1=0".to_string(),
                    Value::Array(_) => {
                        let name = self.map.create_parameter(key, value.clone());
                        format!("{column} IN (:...{name})")
                    }
                    _ => {
                        let name = self.map.create_parameter(key, value.clone());
                        format!("{column} = :{name}")
                    }
                }
            })
            .collect();
        parts.join(" AND ")
    }

    /// Quoted column for a property or column name, alias-prefixed when the
    /// builder prefixes aliases.
    fn column_reference(&self, property: &str) -> String {
        if property.contains('.') {
            return self.dialect.quote_path(property);
        }
        let alias = self.map.main_alias.as_ref();
        let column = alias
            .and_then(|a| a.metadata.as_ref())
            .and_then(|m| m.find_column(property))
            .map_or(property, |c| c.database_name.as_str());
        let quoted = self.dialect.quote_identifier(column);
        match alias {
            Some(alias) if self.map.alias_name_prefixing_enabled => {
                format!("{}.{}", self.dialect.quote_identifier(&alias.name), quoted)
            }
            _ => quoted,
        }
    }

    fn where_ids_condition(&mut self, ids: Vec<IdValue>) -> String {
        let Some(alias) = self.map.main_alias.clone() else {
            self.map
                .defer_error(DeferredError::MissingPrimaryColumns(String::new()));
            return "1=0".to_string();
        };
        let Some(metadata) = alias.metadata.filter(|m| m.has_primary_columns()) else {
            self.map
                .defer_error(DeferredError::MissingPrimaryColumns(alias.name.clone()));
            return "1=0".to_string();
        };
        if ids.is_empty() {
            return "1=0".to_string();
        }

        let primary: Vec<(String, String)> = metadata
            .primary_columns()
            .map(|c| (c.property_name.clone(), c.database_name.clone()))
            .collect();

        if let [(property, database)] = primary.as_slice() {
            let column = self.column_reference(database);
            let mut names = Vec::with_capacity(ids.len());
            for id in ids {
                let value = match id {
                    IdValue::Scalar(value) => value,
                    IdValue::Map(filter) => {
                        match filter.get(property).or_else(|| filter.get(database)) {
                            Some(value) => value.clone(),
                            None => {
                                self.map.defer_error(DeferredError::IncompleteId {
                                    entity: metadata.name().to_string(),
                                    column: property.clone(),
                                });
                                return "1=0".to_string();
                            }
                        }
                    }
                };
                names.push(self.map.create_parameter(database, value));
            }
            return match names.as_slice() {
                [name] => format!("{column} = :{name}"),
                _ => {
                    let list: Vec<String> = names.iter().map(|n| format!(":{n}")).collect();
                    format!("{column} IN ({})", list.join(", "))
                }
            };
        }

        let mut terms = Vec::with_capacity(ids.len());
        for id in ids {
            let IdValue::Map(filter) = id else {
                self.map.defer_error(DeferredError::IncompleteId {
                    entity: metadata.name().to_string(),
                    column: primary[1].0.clone(),
                });
                return "1=0".to_string();
            };
            let mut parts = Vec::with_capacity(primary.len());
            for (property, database) in &primary {
                let Some(value) = filter.get(property).or_else(|| filter.get(database)) else {
                    self.map.defer_error(DeferredError::IncompleteId {
                        entity: metadata.name().to_string(),
                        column: property.clone(),
                    });
                    return "1=0".to_string();
                };
                let column = self.column_reference(database);
                let name = self.map.create_parameter(database, value.clone());
                parts.push(format!("{column} = :{name}"));
            }
            terms.push(format!("({})", parts.join(" AND ")));
        }
        match terms.len() {
            1 => terms.remove(0),
            _ => format!("({})", terms.join(" OR ")),
        }
    }
}
