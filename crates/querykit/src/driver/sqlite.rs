//! SQLite driver using `rusqlite`.
//!
//! SQLite has a single writer, so all query runners share one connection
//! guarded by an async mutex. A runner outside a transaction holds the lock
//! for one statement at a time. A runner that begins a transaction keeps the
//! lock until it commits or rolls back, so other runners wait instead of
//! joining its transaction. Statements run on the blocking thread pool via
//! `tokio::task::spawn_blocking`.

use super::{Driver, QueryRunner, RawResult};
use crate::dialect::{Dialect, Sqlite};
use crate::error::{OrmResult, QueryError};
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Connection = OwnedMutexGuard<rusqlite::Connection>;

/// SQLite driver.
#[derive(Clone)]
pub struct SqliteDriver {
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteDriver {
    /// Open (or create) a database file. `:memory:` opens an in-memory database.
    pub fn open(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(QueryError::from_sqlite_error)?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(QueryError::from_sqlite_error)?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database.
    pub fn memory() -> OrmResult<Self> {
        Self::open(":memory:")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a batch of statements outside any query runner (schema setup, fixtures).
    ///
    /// Waits for an open transaction on any runner to finish first.
    pub async fn execute_batch(&self, sql: &str) -> OrmResult<()> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        let sql = sql.to_string();
        blocking(move || conn.execute_batch(&sql).map_err(QueryError::from_sqlite_error)).await?
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> &dyn Dialect {
        &Sqlite
    }

    async fn create_query_runner(&self) -> OrmResult<Arc<dyn QueryRunner>> {
        Ok(Arc::new(SqliteQueryRunner {
            conn: Arc::clone(&self.conn),
            session: Mutex::new(None),
            transaction_active: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }))
    }
}

/// A handle onto the shared SQLite connection.
pub struct SqliteQueryRunner {
    conn: Arc<Mutex<rusqlite::Connection>>,
    /// The connection, held for as long as this runner's transaction is open.
    session: Mutex<Option<Connection>>,
    transaction_active: AtomicBool,
    released: AtomicBool,
}

async fn blocking<T, F>(f: F) -> OrmResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QueryError::Other(format!("Task join error: {e}")))
}

impl SqliteQueryRunner {
    fn ensure_open(&self) -> OrmResult<()> {
        if self.is_released() {
            return Err(QueryError::Connection(
                "query runner already released".to_string(),
            ));
        }
        Ok(())
    }

    /// Run `f` on the held transaction connection, or on the shared one for
    /// a single call. The connection stays held while SQLite reports an
    /// open transaction and is let go once it is back in autocommit mode.
    async fn with_connection<T, F>(&self, f: F) -> OrmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> OrmResult<T> + Send + 'static,
    {
        let mut session = self.session.lock().await;
        let conn = match session.take() {
            Some(conn) => conn,
            None => Arc::clone(&self.conn).lock_owned().await,
        };
        let (conn, result) = blocking(move || {
            let result = f(&conn);
            (conn, result)
        })
        .await?;

        let open = !conn.is_autocommit();
        self.transaction_active.store(open, Ordering::SeqCst);
        if open {
            *session = Some(conn);
        }
        result
    }
}

#[async_trait]
impl QueryRunner for SqliteQueryRunner {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<RawResult> {
        self.ensure_open()?;
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_connection(move |conn| run(conn, &sql, &params))
            .await
    }

    async fn start_transaction(&self) -> OrmResult<()> {
        self.ensure_open()?;
        if self.is_transaction_active() {
            return Err(QueryError::Connection(
                "transaction already started on this runner".to_string(),
            ));
        }
        self.with_connection(|conn| {
            conn.execute_batch("BEGIN")
                .map_err(QueryError::from_sqlite_error)
        })
        .await
    }

    async fn commit_transaction(&self) -> OrmResult<()> {
        self.ensure_open()?;
        if !self.is_transaction_active() {
            return Err(QueryError::Connection("no transaction is active".to_string()));
        }
        self.with_connection(|conn| {
            conn.execute_batch("COMMIT")
                .map_err(QueryError::from_sqlite_error)
        })
        .await
    }

    async fn rollback_transaction(&self) -> OrmResult<()> {
        self.ensure_open()?;
        if !self.is_transaction_active() {
            return Err(QueryError::Connection("no transaction is active".to_string()));
        }
        self.with_connection(|conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(QueryError::from_sqlite_error)
        })
        .await
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction_active.load(Ordering::SeqCst)
    }

    /// Rolls back a transaction left open and lets go of the connection.
    async fn release(&self) -> OrmResult<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let held = self.session.lock().await.take();
        self.transaction_active.store(false, Ordering::SeqCst);
        match held {
            Some(conn) => {
                blocking(move || {
                    conn.execute_batch("ROLLBACK")
                        .map_err(QueryError::from_sqlite_error)
                })
                .await?
            }
            None => Ok(()),
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for SqliteQueryRunner {
    fn drop(&mut self) {
        if let Some(conn) = self.session.get_mut().take() {
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(target: "querykit.tx", error = %err, "rollback of dropped SQLite runner failed");
            }
        }
    }
}

fn run(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> OrmResult<RawResult> {
    let mut stmt = conn.prepare(sql).map_err(QueryError::from_sqlite_error)?;
    let params = rusqlite::params_from_iter(params.iter());

    if stmt.column_count() == 0 {
        let affected = stmt.execute(params).map_err(QueryError::from_sqlite_error)?;
        return Ok(RawResult::affected(affected as u64));
    }

    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into();
    let readonly = stmt.readonly();

    let mut rows = Vec::new();
    {
        let mut raw_rows = stmt.query(params).map_err(QueryError::from_sqlite_error)?;
        while let Some(raw) = raw_rows.next().map_err(QueryError::from_sqlite_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let value = match raw.get_ref(idx).map_err(QueryError::from_sqlite_error)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::Int(v),
                    ValueRef::Real(v) => Value::Float(v),
                    ValueRef::Text(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
                    ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
                };
                values.push(value);
            }
            rows.push(Row::new(Arc::clone(&columns), values));
        }
    }

    // A mutation with RETURNING both yields rows and changes them.
    let affected = (!readonly).then(|| conn.changes() as u64);
    Ok(RawResult::new(rows, affected))
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Uuid(v) => ToSqlOutput::Owned(SqlValue::Text(v.to_string())),
            Value::Timestamp(v) => ToSqlOutput::Owned(SqlValue::Text(v.to_rfc3339())),
            Value::Json(v) => ToSqlOutput::Owned(SqlValue::Text(v.to_string())),
            Value::Array(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "array parameters must be spread with :...name".into(),
                ));
            }
        })
    }
}
