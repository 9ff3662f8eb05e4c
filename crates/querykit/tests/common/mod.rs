//! Recording in-memory driver shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use querykit::dialect::Postgres;
use querykit::{
    ColumnOptions, DataSource, Dialect, Driver, EntityEvent, EntityMetadata, EntitySubscriber,
    OrmResult, QueryError, QueryRunner, RawResult, Row, Value,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered log of everything the driver, runners and subscribers did.
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
}

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.statements.lock().unwrap().clear();
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// Knobs that decide how the next statements behave.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_query: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_release: bool,
    pub rows: Vec<Row>,
    pub affected: Option<u64>,
    pub query_delay: Option<Duration>,
    /// Statement timeout enforced by the runner, as a real driver would.
    pub query_timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct RecordingDriver {
    pub journal: Arc<Journal>,
    pub script: Arc<Mutex<Script>>,
    dialect: &'static dyn Dialect,
    acquired: Arc<AtomicUsize>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::with_dialect(&Postgres)
    }

    pub fn with_dialect(dialect: &'static dyn Dialect) -> Self {
        Self {
            journal: Arc::new(Journal::default()),
            script: Arc::new(Mutex::new(Script::default())),
            dialect,
            acquired: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect
    }

    async fn create_query_runner(&self) -> OrmResult<Arc<dyn QueryRunner>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.journal.record("acquire");
        Ok(Arc::new(RecordingRunner {
            journal: Arc::clone(&self.journal),
            script: Arc::clone(&self.script),
            transaction_active: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }))
    }
}

pub struct RecordingRunner {
    journal: Arc<Journal>,
    script: Arc<Mutex<Script>>,
    transaction_active: AtomicBool,
    released: AtomicBool,
}

impl RecordingRunner {
    fn script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryRunner for RecordingRunner {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<RawResult> {
        let script = self.script();
        self.journal.record("query");
        self.journal
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if let Some(delay) = script.query_delay {
            match script.query_timeout {
                Some(timeout) if timeout < delay => {
                    tokio::time::sleep(timeout).await;
                    return Err(QueryError::Timeout(timeout));
                }
                _ => tokio::time::sleep(delay).await,
            }
        }
        if script.fail_query {
            return Err(QueryError::Other("query failed".to_string()));
        }
        Ok(RawResult::new(script.rows, script.affected))
    }

    async fn start_transaction(&self) -> OrmResult<()> {
        self.journal.record("begin");
        self.transaction_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit_transaction(&self) -> OrmResult<()> {
        self.journal.record("commit");
        if self.script().fail_commit {
            return Err(QueryError::Other("commit failed".to_string()));
        }
        self.transaction_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback_transaction(&self) -> OrmResult<()> {
        self.journal.record("rollback");
        self.transaction_active.store(false, Ordering::SeqCst);
        if self.script().fail_rollback {
            return Err(QueryError::Other("rollback failed".to_string()));
        }
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction_active.load(Ordering::SeqCst)
    }

    async fn release(&self) -> OrmResult<()> {
        self.journal.record("release");
        self.released.store(true, Ordering::SeqCst);
        if self.script().fail_release {
            return Err(QueryError::Other("release failed".to_string()));
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Subscriber that writes its calls into the journal.
pub struct JournalSubscriber {
    pub journal: Arc<Journal>,
    pub listen_to: Option<&'static str>,
    pub fail_before_remove: bool,
}

impl JournalSubscriber {
    pub fn new(journal: &Arc<Journal>) -> Self {
        Self {
            journal: Arc::clone(journal),
            listen_to: None,
            fail_before_remove: false,
        }
    }

    fn record(&self, event: &EntityEvent, name: &str) -> BoxFuture<'static, OrmResult<()>> {
        let journal = Arc::clone(&self.journal);
        let entry = format!("{name}:{}", event.metadata.name());
        Box::pin(async move {
            journal.record(entry);
            Ok(())
        })
    }
}

impl EntitySubscriber for JournalSubscriber {
    fn listen_to(&self) -> Option<&str> {
        self.listen_to
    }

    fn before_remove(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        if self.fail_before_remove {
            return Box::pin(async { Err(QueryError::hook("removal vetoed")) });
        }
        self.record(&event, "before_remove")
    }

    fn after_remove(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        self.record(&event, "after_remove")
    }

    fn before_update(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        self.record(&event, "before_update")
    }

    fn after_update(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        self.record(&event, "after_update")
    }

    fn before_insert(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        self.record(&event, "before_insert")
    }

    fn after_insert(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        self.record(&event, "after_insert")
    }
}

pub fn category() -> EntityMetadata {
    EntityMetadata::builder("Category")
        .table("category")
        .primary_column("id", ColumnOptions::new().column_type("integer"))
        .column("name", ColumnOptions::new().column_type("varchar"))
        .build()
        .unwrap()
}

pub fn data_source(driver: &RecordingDriver) -> DataSource {
    DataSource::new(driver.clone()).with_metadata(category())
}

pub fn id_row(id: i64) -> Row {
    Row::new(Arc::from(vec!["id".to_string()]), vec![Value::Int(id)])
}

/// Install a test subscriber for `tracing` output (`RUST_LOG=querykit=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
