//! Driver and query runner abstractions.
//!
//! A [`Driver`] knows how to reach one database and which [`Dialect`] it
//! speaks. A [`QueryRunner`] is a single connection handle obtained from a
//! driver: it executes SQL, tracks whether a transaction is open on it and
//! must be released once the owner is done with it.
//!
//! Builders accept a caller-supplied runner (borrowed: never committed,
//! rolled back or released by the builder) or obtain their own from the
//! driver (owned: always released by the builder).

use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "pool")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// What a driver reports after running one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    /// Rows produced by the statement (SELECT, or a mutation with RETURNING/OUTPUT).
    pub rows: Vec<Row>,
    /// Rows affected as reported by the engine; `None` when the engine does not say.
    pub affected: Option<u64>,
}

impl RawResult {
    pub fn new(rows: Vec<Row>, affected: Option<u64>) -> Self {
        Self { rows, affected }
    }

    pub fn affected(count: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected: Some(count),
        }
    }
}

/// One connection handle.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Execute a statement with positional parameters already in dialect order.
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<RawResult>;

    async fn start_transaction(&self) -> OrmResult<()>;

    async fn commit_transaction(&self) -> OrmResult<()>;

    async fn rollback_transaction(&self) -> OrmResult<()>;

    /// Whether a transaction is currently open on this handle.
    fn is_transaction_active(&self) -> bool;

    /// Return the handle to its driver. Further queries fail.
    async fn release(&self) -> OrmResult<()>;

    fn is_released(&self) -> bool;
}

/// A database backend.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Capability descriptor used to compile queries for this backend.
    fn dialect(&self) -> &dyn Dialect;

    /// Obtain a fresh connection handle.
    async fn create_query_runner(&self) -> OrmResult<Arc<dyn QueryRunner>>;
}
