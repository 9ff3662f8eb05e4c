//! Statement execution: connection ownership, transactions and hooks.
//!
//! A run moves through
//! `acquire → [begin] → before hooks → statement → after hooks → [commit]`
//! and always ends with the release of a runner it acquired itself. A runner
//! handed in by the caller is never committed or released here, and a
//! transaction that was already active stays untouched.
//!
//! Ownership is decided once, when the runner is obtained, and kept in a
//! [`RunnerGuard`]. If the future is dropped mid-flight the guard's `Drop`
//! schedules the rollback and release on the current Tokio runtime.

use super::builder::QueryBuilder;
use super::compiler;
use crate::driver::{QueryRunner, RawResult};
use crate::error::{OrmResult, QueryError};
use crate::row::Row;
use crate::subscriber::{BroadcasterResult, EventKind};
use std::sync::Arc;
use std::time::Instant;

/// Normalised outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Outcome {
    pub raw: Option<Vec<Row>>,
    pub affected: Option<u64>,
}

impl Outcome {
    /// Rows are kept when RETURNING/OUTPUT was requested or the driver
    /// produced any. The affected count is never guessed.
    fn from_raw(raw: RawResult, returning_requested: bool) -> Self {
        let rows = (returning_requested || !raw.rows.is_empty()).then_some(raw.rows);
        Self {
            raw: rows,
            affected: raw.affected,
        }
    }
}

/// Hook pair fired around a statement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lifecycle {
    pub before: EventKind,
    pub after: EventKind,
}

impl Lifecycle {
    pub(crate) const REMOVE: Lifecycle = Lifecycle {
        before: EventKind::BeforeRemove,
        after: EventKind::AfterRemove,
    };
    pub(crate) const UPDATE: Lifecycle = Lifecycle {
        before: EventKind::BeforeUpdate,
        after: EventKind::AfterUpdate,
    };
    pub(crate) const INSERT: Lifecycle = Lifecycle {
        before: EventKind::BeforeInsert,
        after: EventKind::AfterInsert,
    };
}

struct RunnerGuard {
    runner: Arc<dyn QueryRunner>,
    owns_runner: bool,
    owns_transaction: bool,
    settled: bool,
    released: bool,
    log_errors: bool,
}

impl RunnerGuard {
    async fn acquire(qb: &QueryBuilder) -> OrmResult<Self> {
        let (runner, owns_runner) = match &qb.query_runner {
            Some(runner) => (Arc::clone(runner), false),
            None => (qb.data_source.create_query_runner().await?, true),
        };
        Ok(Self {
            runner,
            owns_runner,
            owns_transaction: false,
            settled: false,
            released: false,
            log_errors: qb.data_source.options().logging.errors,
        })
    }

    /// Roll back a transaction this run started and has not committed.
    /// The rollback error is logged and dropped.
    async fn rollback_owned(&mut self, cause: &QueryError, log_tx: bool) {
        if !self.owns_transaction || self.settled {
            return;
        }
        self.settled = true;
        match self.runner.rollback_transaction().await {
            Ok(()) => {
                if log_tx {
                    tracing::debug!(target: "querykit.tx", "transaction rolled back");
                }
            }
            Err(err) => {
                if self.log_errors {
                    tracing::warn!(
                        target: "querykit.tx",
                        error = %err,
                        cause = %cause,
                        "rollback failed"
                    );
                }
            }
        }
    }

    async fn release(&mut self) {
        if !self.owns_runner || self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.runner.release().await {
            if self.log_errors {
                tracing::warn!(target: "querykit.tx", error = %err, "failed to release query runner");
            }
        }
    }
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        let rollback = self.owns_transaction && !self.settled;
        let release = self.owns_runner && !self.released;
        if !rollback && !release {
            return;
        }

        let runner = Arc::clone(&self.runner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if rollback {
                        if let Err(err) = runner.rollback_transaction().await {
                            tracing::warn!(target: "querykit.tx", error = %err, "rollback after cancellation failed");
                        }
                    }
                    if release {
                        if let Err(err) = runner.release().await {
                            tracing::warn!(target: "querykit.tx", error = %err, "release after cancellation failed");
                        }
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    target: "querykit.tx",
                    "query runner dropped outside a Tokio runtime; cleanup skipped"
                );
            }
        }
    }
}

/// Run the builder's statement with full transaction and hook handling.
///
/// `lifecycle` is `None` for statements that fire no hooks (SELECT).
pub(crate) async fn execute(qb: &QueryBuilder, lifecycle: Option<Lifecycle>) -> OrmResult<Outcome> {
    let compiled = qb.compile()?;
    let options = qb.data_source.options();
    let log_tx = options.logging.transactions;

    let mut guard = RunnerGuard::acquire(qb).await?;
    let result = run(qb, &mut guard, &compiled.sql, &compiled.parameters, lifecycle).await;

    if let Err(err) = &result {
        guard.rollback_owned(err, log_tx).await;
    }
    guard.release().await;
    result
}

async fn run(
    qb: &QueryBuilder,
    guard: &mut RunnerGuard,
    sql: &str,
    parameters: &[crate::value::Value],
    lifecycle: Option<Lifecycle>,
) -> OrmResult<Outcome> {
    let map = &qb.expression_map;
    let options = qb.data_source.options();
    let runner = Arc::clone(&guard.runner);

    if map.use_transaction && !runner.is_transaction_active() {
        runner.start_transaction().await?;
        guard.owns_transaction = true;
        if options.logging.transactions {
            tracing::debug!(target: "querykit.tx", "transaction started");
        }
    }

    let hooks = lifecycle.zip(map.listener_metadata());

    if let Some((lifecycle, metadata)) = &hooks {
        let mut pending = BroadcasterResult::new();
        qb.data_source
            .broadcaster()
            .broadcast(&mut pending, lifecycle.before, metadata);
        pending.wait().await?;
    }

    if options.logging.queries {
        tracing::debug!(
            target: "querykit.sql",
            query_type = ?map.query_type,
            param_count = parameters.len(),
            sql = %options.truncate_sql(sql),
        );
    }

    let start = Instant::now();
    let raw = match runner.query(sql, parameters).await {
        Ok(raw) => raw,
        Err(err) => {
            if options.logging.errors {
                tracing::error!(
                    target: "querykit.sql",
                    error = %err,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    sql = %options.truncate_sql(sql),
                    "query failed"
                );
            }
            return Err(err);
        }
    };
    let outcome = Outcome::from_raw(raw, compiler::rendered_returning(map).is_some());

    if let Some((lifecycle, metadata)) = &hooks {
        let mut pending = BroadcasterResult::new();
        qb.data_source
            .broadcaster()
            .broadcast(&mut pending, lifecycle.after, metadata);
        pending.wait().await?;
    }

    if guard.owns_transaction {
        runner.commit_transaction().await?;
        guard.settled = true;
        if options.logging.transactions {
            tracing::debug!(target: "querykit.tx", "transaction committed");
        }
    }

    Ok(outcome)
}
