//! Renders an [`ExpressionMap`] into SQL for one dialect.
//!
//! Compilation happens in two passes. [`render`] produces SQL that still
//! carries named placeholders (`:name`, and `:...name` for array spread);
//! [`resolve_parameters`] then rewrites them into the dialect's placeholder
//! style and collects the values in placeholder order.

use super::expression_map::{
    Alias, ExpressionMap, JoinType, QueryType, Returning, WhereClause, WhereType,
};
use crate::dialect::{Dialect, LimitStyle, PlaceholderStyle, ReturningPlacement};
use crate::error::{OrmResult, QueryError};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Final SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub parameters: Vec<Value>,
}

/// Render and resolve placeholders.
pub fn compile(map: &ExpressionMap, dialect: &dyn Dialect) -> OrmResult<CompiledQuery> {
    let sql = render(map, dialect)?;
    resolve_parameters(&sql, &map.parameters, dialect)
}

/// Render SQL with named placeholders left in place.
pub fn render(map: &ExpressionMap, dialect: &dyn Dialect) -> OrmResult<String> {
    let alias = map.main_alias.as_ref().ok_or(QueryError::MissingMainAlias)?;
    if let Some(err) = &map.deferred_error {
        return Err(err.clone().into());
    }
    if map.returning.is_some() && map.query_type != QueryType::Select && !dialect.supports_returning()
    {
        return Err(QueryError::ReturningNotSupported(dialect.name()));
    }

    match map.query_type {
        QueryType::Delete => Ok(render_delete(map, alias, dialect)),
        QueryType::Update => render_update(map, alias, dialect),
        QueryType::Insert => render_insert(map, alias, dialect),
        QueryType::Select => Ok(render_select(map, alias, dialect)),
    }
}

/// Join WHERE entries with their combinators. The first combinator is ignored.
pub(crate) fn fold_wheres(wheres: &[WhereClause]) -> String {
    let mut out = String::new();
    for (idx, clause) in wheres.iter().enumerate() {
        if idx > 0 {
            out.push_str(match clause.kind {
                WhereType::Or => " OR ",
                WhereType::And | WhereType::Simple => " AND ",
            });
        }
        out.push_str(&clause.condition);
    }
    out
}

fn render_delete(map: &ExpressionMap, alias: &Alias, dialect: &dyn Dialect) -> String {
    let mut sql = format!("DELETE FROM {}", dialect.quote_path(&alias.table_name));
    push_output(&mut sql, map, dialect, "DELETED");
    push_where(&mut sql, map);
    push_returning(&mut sql, map, dialect);
    sql
}

fn render_update(map: &ExpressionMap, alias: &Alias, dialect: &dyn Dialect) -> OrmResult<String> {
    if map.set.is_empty() {
        return Err(QueryError::EmptySet(alias.table_name.clone()));
    }
    let assignments: Vec<String> = map
        .set
        .iter()
        .map(|(column, expr)| format!("{} = {}", dialect.quote_identifier(column), expr))
        .collect();

    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_path(&alias.table_name),
        assignments.join(", ")
    );
    push_output(&mut sql, map, dialect, "INSERTED");
    push_where(&mut sql, map);
    push_returning(&mut sql, map, dialect);
    Ok(sql)
}

fn render_insert(map: &ExpressionMap, alias: &Alias, dialect: &dyn Dialect) -> OrmResult<String> {
    if map.value_rows.is_empty() {
        return Err(QueryError::EmptyValues(alias.table_name.clone()));
    }

    // Union of columns in order of first appearance.
    let mut columns: Vec<&str> = Vec::new();
    for row in &map.value_rows {
        for column in row.keys() {
            if !columns.contains(&column.as_str()) {
                columns.push(column);
            }
        }
    }

    let mut sql = format!("INSERT INTO {}", dialect.quote_path(&alias.table_name));
    if columns.is_empty() {
        if map.value_rows.len() > 1 {
            return Err(QueryError::EmptyValues(alias.table_name.clone()));
        }
        push_output(&mut sql, map, dialect, "INSERTED");
        sql.push_str(" DEFAULT VALUES");
        push_returning(&mut sql, map, dialect);
        return Ok(sql);
    }

    let quoted: Vec<String> = columns.iter().map(|c| dialect.quote_identifier(c)).collect();
    sql.push_str(&format!(" ({})", quoted.join(", ")));
    push_output(&mut sql, map, dialect, "INSERTED");

    let rows: Vec<String> = map
        .value_rows
        .iter()
        .map(|row| {
            let values: Vec<&str> = columns
                .iter()
                .map(|c| {
                    row.get(*c)
                        .map_or(dialect.default_value_keyword(), String::as_str)
                })
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();
    sql.push_str(" VALUES ");
    sql.push_str(&rows.join(", "));
    push_returning(&mut sql, map, dialect);
    Ok(sql)
}

fn render_select(map: &ExpressionMap, alias: &Alias, dialect: &dyn Dialect) -> String {
    let columns = if map.selects.is_empty() {
        "*".to_string()
    } else {
        map.selects
            .iter()
            .map(|s| quote_expression(s, dialect))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!(
        "SELECT {} FROM {} {}",
        columns,
        dialect.quote_path(&alias.table_name),
        dialect.quote_identifier(&alias.name)
    );

    for join in &map.joins {
        let keyword = match join.kind {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        };
        sql.push_str(&format!(
            " {} {} {}",
            keyword,
            dialect.quote_path(&join.alias.table_name),
            dialect.quote_identifier(&join.alias.name)
        ));
        if let Some(condition) = &join.condition {
            sql.push_str(" ON ");
            sql.push_str(condition);
        }
    }

    push_where(&mut sql, map);

    if !map.group_bys.is_empty() {
        let groups: Vec<String> = map
            .group_bys
            .iter()
            .map(|g| quote_expression(g, dialect))
            .collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&groups.join(", "));
    }

    if !map.order_bys.is_empty() {
        let orders: Vec<String> = map
            .order_bys
            .iter()
            .map(|(column, order)| format!("{} {}", quote_expression(column, dialect), order.as_sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders.join(", "));
    }

    match dialect.limit_style() {
        LimitStyle::LimitOffset => {
            if let Some(limit) = map.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(offset) = map.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        LimitStyle::OffsetFetch => {
            if map.limit.is_some() || map.offset.is_some() {
                sql.push_str(&format!(" OFFSET {} ROWS", map.offset.unwrap_or(0)));
            }
            if let Some(limit) = map.limit {
                sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
            }
        }
    }

    sql
}

/// Quote plain column paths; leave anything else (function calls, casts) as is.
fn quote_expression(expr: &str, dialect: &dyn Dialect) -> String {
    let is_path = !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '*');
    if is_path {
        dialect.quote_path(expr)
    } else {
        expr.to_string()
    }
}

fn push_where(sql: &mut String, map: &ExpressionMap) {
    if map.wheres.is_empty() {
        return;
    }
    sql.push_str(" WHERE ");
    sql.push_str(&fold_wheres(&map.wheres));
}

fn returning_list(returning: &Returning, dialect: &dyn Dialect, prefix: Option<&str>) -> String {
    match returning {
        Returning::Raw(sql) => sql.clone(),
        Returning::Columns(columns) => columns
            .iter()
            .map(|column| {
                let quoted = dialect.quote_path(column);
                match prefix {
                    Some(prefix) => format!("{prefix}.{quoted}"),
                    None => quoted,
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// The clause to render; an empty column list renders nothing.
pub(crate) fn rendered_returning(map: &ExpressionMap) -> Option<&Returning> {
    map.returning.as_ref().filter(|returning| match returning {
        Returning::Columns(columns) => !columns.is_empty(),
        Returning::Raw(sql) => !sql.trim().is_empty(),
    })
}

fn push_output(sql: &mut String, map: &ExpressionMap, dialect: &dyn Dialect, pseudo_table: &str) {
    if dialect.returning_placement() != ReturningPlacement::Infix {
        return;
    }
    if let Some(returning) = rendered_returning(map) {
        sql.push_str(" OUTPUT ");
        sql.push_str(&returning_list(returning, dialect, Some(pseudo_table)));
    }
}

fn push_returning(sql: &mut String, map: &ExpressionMap, dialect: &dyn Dialect) {
    if dialect.returning_placement() != ReturningPlacement::Suffix {
        return;
    }
    if let Some(returning) = rendered_returning(map) {
        sql.push_str(" RETURNING ");
        sql.push_str(&returning_list(returning, dialect, None));
    }
}

/// Rewrite named placeholders into the dialect's style.
///
/// Quoted literals and identifiers are copied untouched, as are `::` casts.
/// For numbered and named styles a repeated name reuses its placeholder;
/// with `?` every occurrence binds the value again. `:...name` expands an
/// array into one placeholder per element, and an empty array into `NULL`.
pub fn resolve_parameters(
    sql: &str,
    parameters: &IndexMap<String, Value>,
    dialect: &dyn Dialect,
) -> OrmResult<CompiledQuery> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 16);
    let mut binder = Binder::new(dialect, parameters);
    let identifier_quotes = match dialect.identifier_quotes() {
        (open, close) if open.is_ascii() && close.is_ascii() => Some((open as u8, close as u8)),
        _ => None,
    };
    let mut i = 0;

    while i < bytes.len() {
        let close = match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => Some(quote),
            byte => identifier_quotes
                .filter(|(open, _)| *open == byte)
                .map(|(_, close)| close),
        };
        if let Some(close) = close {
            let mut j = i + 1;
            while j < bytes.len() {
                if bytes[j] == close {
                    if bytes.get(j + 1) == Some(&close) {
                        j += 2;
                        continue;
                    }
                    j += 1;
                    break;
                }
                j += 1;
            }
            let end = j.min(bytes.len());
            out.push_str(&sql[i..end]);
            i = end;
            continue;
        }

        match bytes[i] {
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    out.push_str("::");
                    i += 2;
                    continue;
                }
                let spread = sql[i + 1..].starts_with("...");
                let start = if spread { i + 4 } else { i + 1 };
                let end = identifier_end(bytes, start);
                if end == start {
                    out.push(':');
                    i += 1;
                    continue;
                }
                let name = &sql[start..end];
                let value = parameters
                    .get(name)
                    .ok_or_else(|| QueryError::MissingParameter(name.to_string()))?;
                let placeholder = if spread {
                    binder.bind_spread(name, value)
                } else {
                    binder.bind(name, name, value)
                };
                out.push_str(&placeholder);
                i = end;
            }
            _ => {
                let from = i + sql[i..].chars().next().map_or(1, char::len_utf8);
                let next = sql[from..]
                    .find(|ch: char| {
                        matches!(ch, '\'' | '"' | '`' | ':')
                            || identifier_quotes.is_some_and(|(open, _)| ch == open as char)
                    })
                    .map_or(bytes.len(), |offset| from + offset);
                out.push_str(&sql[i..next]);
                i = next;
            }
        }
    }

    Ok(CompiledQuery {
        sql: out,
        parameters: binder.values,
    })
}

fn identifier_end(bytes: &[u8], start: usize) -> usize {
    match bytes.get(start) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return start,
    }
    let mut end = start + 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    end
}

struct Binder<'a> {
    dialect: &'a dyn Dialect,
    parameters: &'a IndexMap<String, Value>,
    reuse: bool,
    seen: HashMap<String, String>,
    /// Names given to spread elements so far.
    spread_names: HashSet<String>,
    values: Vec<Value>,
}

impl<'a> Binder<'a> {
    fn new(dialect: &'a dyn Dialect, parameters: &'a IndexMap<String, Value>) -> Self {
        Self {
            dialect,
            parameters,
            reuse: dialect.placeholder_style() != PlaceholderStyle::Question,
            seen: HashMap::new(),
            spread_names: HashSet::new(),
            values: Vec::new(),
        }
    }

    /// `{name}_{idx}`, suffixed further until it collides with neither a
    /// declared parameter nor another spread element.
    fn spread_element_name(&mut self, name: &str, idx: usize) -> String {
        let base = format!("{name}_{idx}");
        let mut candidate = base.clone();
        let mut n = 0;
        while self.parameters.contains_key(&candidate) || self.spread_names.contains(&candidate) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        self.spread_names.insert(candidate.clone());
        candidate
    }

    fn bind(&mut self, key: &str, name: &str, value: &Value) -> String {
        if self.reuse {
            if let Some(placeholder) = self.seen.get(key) {
                return placeholder.clone();
            }
        }
        self.values.push(value.clone());
        let placeholder = self.dialect.placeholder(self.values.len(), name);
        if self.reuse {
            self.seen.insert(key.to_string(), placeholder.clone());
        }
        placeholder
    }

    fn bind_spread(&mut self, name: &str, value: &Value) -> String {
        match value {
            Value::Array(items) if items.is_empty() => "NULL".to_string(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    let key = format!("...{name}[{idx}]");
                    if let Some(placeholder) = self.seen.get(&key).filter(|_| self.reuse) {
                        return placeholder.clone();
                    }
                    let element = self.spread_element_name(name, idx);
                    self.bind(&key, &element, item)
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => self.bind(name, name, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, Postgres, SqlServer};

    fn params(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn dollar_placeholders_reuse_repeated_names() {
        let p = params(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let q = resolve_parameters("x = :a AND y = :b OR z = :a", &p, &Postgres).unwrap();
        assert_eq!(q.sql, "x = $1 AND y = $2 OR z = $1");
        assert_eq!(q.parameters, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn question_placeholders_repeat_values() {
        let p = params(&[("a", Value::Int(1))]);
        let q = resolve_parameters("x = :a OR z = :a", &p, &MySql).unwrap();
        assert_eq!(q.sql, "x = ? OR z = ?");
        assert_eq!(q.parameters.len(), 2);
    }

    #[test]
    fn spread_expands_arrays() {
        let p = params(&[("ids", Value::from(vec![1, 2, 3])), ("none", Value::Array(vec![]))]);
        let q = resolve_parameters("id IN (:...ids) OR id IN (:...none)", &p, &SqlServer).unwrap();
        assert_eq!(q.sql, "id IN (@P1, @P2, @P3) OR id IN (NULL)");
        assert_eq!(q.parameters.len(), 3);
    }

    #[test]
    fn casts_and_literals_are_untouched() {
        let p = params(&[("a", Value::from("x"))]);
        let q = resolve_parameters("SELECT ':nope', \"a:b\", :a::text", &p, &Postgres).unwrap();
        assert_eq!(q.sql, "SELECT ':nope', \"a:b\", $1::text");
        assert_eq!(q.parameters, vec![Value::from("x")]);
    }

    #[test]
    fn missing_parameter_is_reported() {
        let err = resolve_parameters("x = :gone", &IndexMap::new(), &Postgres).unwrap_err();
        assert!(matches!(err, QueryError::MissingParameter(name) if name == "gone"));
    }

    #[test]
    fn bracket_identifiers_are_untouched() {
        let p = params(&[("a", Value::Int(1))]);
        let q = resolve_parameters("DELETE FROM [odd:name] WHERE [x]]:y] = :a", &p, &SqlServer)
            .unwrap();
        assert_eq!(q.sql, "DELETE FROM [odd:name] WHERE [x]]:y] = @P1");
        assert_eq!(q.parameters, vec![Value::Int(1)]);
    }

    #[derive(Debug)]
    struct NamedStyle;

    impl Dialect for NamedStyle {
        fn name(&self) -> &'static str {
            "named"
        }

        fn supports_returning(&self) -> bool {
            true
        }

        fn placeholder_style(&self) -> PlaceholderStyle {
            PlaceholderStyle::Named
        }
    }

    #[test]
    fn spread_names_avoid_declared_parameters() {
        let p = params(&[
            ("ids", Value::from(vec![10, 20])),
            ("ids_0", Value::Int(99)),
        ]);
        let q = resolve_parameters("id IN (:...ids) OR id = :ids_0 OR id IN (:...ids)", &p, &NamedStyle)
            .unwrap();
        assert_eq!(q.sql, "id IN (:ids_0_1, :ids_1) OR id = :ids_0 OR id IN (:ids_0_1, :ids_1)");
        assert_eq!(q.parameters, vec![Value::Int(10), Value::Int(20), Value::Int(99)]);
    }

    #[test]
    fn bare_colons_are_kept() {
        let q = resolve_parameters("a[1:2] = ': '", &IndexMap::new(), &Postgres).unwrap();
        assert_eq!(q.sql, "a[1:2] = ': '");
    }

    #[test]
    fn fold_uses_later_combinators() {
        let wheres = vec![
            WhereClause { kind: WhereType::Simple, condition: "a".into() },
            WhereClause { kind: WhereType::Or, condition: "b".into() },
            WhereClause { kind: WhereType::And, condition: "c".into() },
        ];
        assert_eq!(fold_wheres(&wheres), "a OR b AND c");
    }

    #[test]
    fn expressions_are_not_quoted() {
        assert_eq!(quote_expression("c.name", &Postgres), "\"c\".\"name\"");
        assert_eq!(quote_expression("COUNT(*)", &Postgres), "COUNT(*)");
        assert_eq!(quote_expression("c.*", &Postgres), "\"c\".*");
    }
}
