//! Error types for querykit

use thiserror::Error;

/// Result type alias for querykit operations
pub type OrmResult<T> = Result<T, QueryError>;

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum QueryError {
    // ==================== Configuration ====================
    /// The builder was compiled before `from()` / `into()` named a target.
    #[error("Query builder has no main alias; call from() before building the query")]
    MissingMainAlias,

    /// A `:name` placeholder has no bound value.
    #[error("Missing value for parameter \"{0}\"")]
    MissingParameter(String),

    /// `where_in_ids` was used on a target without primary columns.
    #[error("Entity \"{0}\" has no primary columns")]
    MissingPrimaryColumns(String),

    /// A composite id did not carry a value for every primary column.
    #[error("Id for entity \"{entity}\" is missing primary column \"{column}\"")]
    IncompleteId { entity: String, column: String },

    /// Primary columns may never be declared nullable.
    #[error("Primary column {entity}.{column} cannot be nullable")]
    NullablePrimaryColumn { entity: String, column: String },

    /// Column declared without a type.
    #[error("Column type for {entity}.{column} is not defined")]
    ColumnTypeUndefined { entity: String, column: String },

    /// UPDATE without any SET entries.
    #[error("UPDATE on \"{0}\" has no values to set")]
    EmptySet(String),

    /// INSERT without any value rows.
    #[error("INSERT into \"{0}\" has no values")]
    EmptyValues(String),

    // ==================== Capability ====================
    /// RETURNING/OUTPUT requested on a dialect that cannot render it.
    #[error("RETURNING/OUTPUT clause is not supported by the {0} dialect")]
    ReturningNotSupported(&'static str),

    // ==================== Execution ====================
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// SQLite driver error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A lifecycle subscriber failed.
    #[error("Subscriber error: {0}")]
    Hook(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl QueryError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a subscriber error
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Errors caused by misuse of the builder or the metadata API.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingMainAlias
                | Self::MissingParameter(_)
                | Self::MissingPrimaryColumns(_)
                | Self::IncompleteId { .. }
                | Self::NullablePrimaryColumn { .. }
                | Self::ColumnTypeUndefined { .. }
                | Self::EmptySet(_)
                | Self::EmptyValues(_)
        )
    }

    /// Errors caused by asking a dialect for something it cannot express.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, Self::ReturningNotSupported(_))
    }

    /// Parse a tokio_postgres error into a more specific QueryError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }

    /// Parse a rusqlite error into a more specific QueryError
    #[cfg(feature = "sqlite")]
    pub fn from_sqlite_error(err: rusqlite::Error) -> Self {
        use rusqlite::ffi::ErrorCode;

        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            if code.code == ErrorCode::ConstraintViolation {
                let message = message.clone().unwrap_or_default();
                return match code.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Self::UniqueViolation(message),
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        Self::ForeignKeyViolation(message)
                    }
                    rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => Self::CheckViolation(message),
                    _ => Self::Sqlite(err),
                };
            }
        }
        Self::Sqlite(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for QueryError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
