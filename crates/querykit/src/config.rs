use serde::{Deserialize, Serialize};

/// What the executor logs through `tracing`.
///
/// Statements go to the `querykit.sql` target at `DEBUG`, transaction
/// transitions to `querykit.tx`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Log every executed statement.
    pub queries: bool,
    /// Log failed statements and swallowed cleanup errors.
    pub errors: bool,
    /// Log transaction begin/commit/rollback.
    pub transactions: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            queries: false,
            errors: true,
            transactions: false,
        }
    }
}

impl LoggingOptions {
    /// Log statements, errors and transactions.
    pub fn all() -> Self {
        Self {
            queries: true,
            errors: true,
            transactions: true,
        }
    }

    /// Log nothing.
    pub fn none() -> Self {
        Self {
            queries: false,
            errors: false,
            transactions: false,
        }
    }
}

/// Options shared by every builder created from a data source.
///
/// Missing fields take their default when deserialized, so a partial config
/// file is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceOptions {
    pub logging: LoggingOptions,
    /// Initial `use_transaction` flag of new mutation builders (default off).
    pub use_transaction_by_default: bool,
    /// Truncate logged SQL (in bytes). `None` logs the full statement.
    pub max_sql_log_length: Option<usize>,
}

impl Default for DataSourceOptions {
    fn default() -> Self {
        Self {
            logging: LoggingOptions::default(),
            use_transaction_by_default: false,
            max_sql_log_length: Some(500),
        }
    }
}

impl DataSourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logging(mut self, logging: LoggingOptions) -> Self {
        self.logging = logging;
        self
    }

    /// Whether mutation builders wrap their statement in a transaction when
    /// none is active yet.
    pub fn with_use_transaction(mut self, enabled: bool) -> Self {
        self.use_transaction_by_default = enabled;
        self
    }

    pub fn with_max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_log_length = None;
        self
    }

    pub(crate) fn truncate_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_log_length {
            Some(max) if sql.len() > max => {
                std::borrow::Cow::Owned(format!("{}...", truncate_sql_bytes(sql, max)))
            }
            _ => std::borrow::Cow::Borrowed(sql),
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = DataSourceOptions::default();
        assert!(!options.use_transaction_by_default);
        assert!(options.logging.errors);
        assert!(!options.logging.queries);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let options = DataSourceOptions::new().with_max_sql_log_length(2);
        assert_eq!(options.truncate_sql("éé"), "é...");
        assert_eq!(options.truncate_sql("ab"), "ab");
        assert_eq!(DataSourceOptions::new().no_truncate().truncate_sql("abc"), "abc");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let options: DataSourceOptions = serde_json::from_str(
            r#"{ "logging": { "queries": true }, "max_sql_log_length": null }"#,
        )
        .unwrap();
        assert!(options.logging.queries);
        assert!(options.logging.errors);
        assert!(!options.use_transaction_by_default);
        assert_eq!(options.max_sql_log_length, None);
    }
}
