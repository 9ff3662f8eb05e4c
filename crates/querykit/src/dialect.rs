//! Dialect capability descriptors.
//!
//! The compiler never asks *which* backend it is talking to. It only asks a
//! [`Dialect`] what the backend can do: whether it can return rows from a
//! mutation, where that clause goes, how identifiers are quoted and how bound
//! parameters are spelled. Adding a backend means implementing this trait.

use std::fmt;

/// Where a RETURNING/OUTPUT clause is placed in a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningPlacement {
    /// `DELETE FROM t WHERE ... RETURNING cols`
    Suffix,
    /// `DELETE FROM t OUTPUT cols WHERE ...`
    Infix,
}

/// How parameters are spelled in the final SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...`; a repeated name reuses its index.
    Dollar,
    /// `?, ?, ...`; a repeated name binds its value again.
    Question,
    /// `@P1, @P2, ...`; a repeated name reuses its index.
    AtP,
    /// `:name`; values are listed once, in order of first use.
    Named,
}

/// Row limiting syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
}

/// Capabilities and syntax of one SQL backend.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Human readable backend name, used in error messages.
    fn name(&self) -> &'static str;

    fn supports_returning(&self) -> bool;

    fn returning_placement(&self) -> ReturningPlacement {
        ReturningPlacement::Suffix
    }

    fn placeholder_style(&self) -> PlaceholderStyle;

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::LimitOffset
    }

    /// Filler for columns an INSERT row leaves out.
    fn default_value_keyword(&self) -> &'static str {
        "DEFAULT"
    }

    /// Opening and closing identifier quote characters.
    fn identifier_quotes(&self) -> (char, char) {
        ('"', '"')
    }

    /// Quote a single identifier part, doubling embedded closing quotes.
    fn quote_identifier(&self, ident: &str) -> String {
        if ident == "*" {
            return ident.to_string();
        }
        let (open, close) = self.identifier_quotes();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(open);
        for ch in ident.chars() {
            if ch == close {
                out.push(close);
            }
            out.push(ch);
        }
        out.push(close);
        out
    }

    /// Quote a dotted path (`schema.table`, `alias.column`) part by part.
    fn quote_path(&self, path: &str) -> String {
        path.split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Render the placeholder for the `index`-th (1-based) distinct parameter.
    fn placeholder(&self, index: usize, name: &str) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Dollar => format!("${index}"),
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::AtP => format!("@P{index}"),
            PlaceholderStyle::Named => format!(":{name}"),
        }
    }
}

/// PostgreSQL (and CockroachDB).
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }
}

/// SQLite 3.35+.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    // SQLite has no DEFAULT keyword inside VALUES.
    fn default_value_keyword(&self) -> &'static str {
        "NULL"
    }
}

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('`', '`')
    }
}

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn returning_placement(&self) -> ReturningPlacement {
        ReturningPlacement::Infix
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtP
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::OffsetFetch
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('[', ']')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(Postgres.quote_identifier("category"), "\"category\"");
        assert_eq!(MySql.quote_identifier("category"), "`category`");
        assert_eq!(SqlServer.quote_identifier("category"), "[category]");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(Postgres.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(SqlServer.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn quotes_dotted_paths() {
        assert_eq!(Postgres.quote_path("public.category"), "\"public\".\"category\"");
        assert_eq!(Postgres.quote_path("c.*"), "\"c\".*");
    }

    #[test]
    fn placeholders() {
        assert_eq!(Postgres.placeholder(3, "id"), "$3");
        assert_eq!(Sqlite.placeholder(3, "id"), "?");
        assert_eq!(SqlServer.placeholder(3, "id"), "@P3");
    }
}
