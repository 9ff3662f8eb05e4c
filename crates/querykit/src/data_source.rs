//! The entry point: a driver plus entity metadata, subscribers and options.

use crate::config::DataSourceOptions;
use crate::dialect::Dialect;
use crate::driver::{Driver, QueryRunner};
use crate::error::OrmResult;
use crate::metadata::{EntityMetadata, MetadataRegistry};
use crate::qb::{DeleteQueryBuilder, InsertQueryBuilder, SelectQueryBuilder, UpdateQueryBuilder};
use crate::subscriber::{Broadcaster, EntitySubscriber};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Shared handle to one database.
///
/// Cloning is cheap. Configuration methods (`with_*`) are meant to be called
/// while setting the data source up, before builders are handed out; a builder
/// keeps the configuration it was created with.
///
/// # Example
///
/// ```ignore
/// let ds = DataSource::new(PostgresDriver::connect(&url, 16)?)
///     .with_metadata(category_metadata)
///     .with_subscriber(Arc::new(AuditSubscriber::default()));
///
/// let result = ds
///     .delete()
///     .from("Category")
///     .where_("name = :name")
///     .set_parameter("name", "Category #1")
///     .execute()
///     .await?;
/// assert_eq!(result.affected, Some(1));
/// ```
#[derive(Clone)]
pub struct DataSource {
    driver: Arc<dyn Driver>,
    metadata: Arc<MetadataRegistry>,
    broadcaster: Arc<Broadcaster>,
    options: Arc<DataSourceOptions>,
}

impl DataSource {
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self::from_driver(Arc::new(driver))
    }

    pub fn from_driver(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            metadata: Arc::new(MetadataRegistry::new()),
            broadcaster: Arc::new(Broadcaster::new()),
            options: Arc::new(DataSourceOptions::default()),
        }
    }

    pub fn with_options(mut self, options: DataSourceOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// Register entity metadata. Targets are looked up by entity name first,
    /// then by table name.
    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        Arc::make_mut(&mut self.metadata).register(metadata);
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn EntitySubscriber>) -> Self {
        Arc::make_mut(&mut self.broadcaster).add_subscriber(subscriber);
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.driver.dialect()
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    pub fn has_metadata(&self, target: &str) -> bool {
        self.metadata.find(target).is_some()
    }

    /// Acquire a new query runner. The caller owns it and must release it.
    pub async fn create_query_runner(&self) -> OrmResult<Arc<dyn QueryRunner>> {
        self.driver.create_query_runner().await
    }

    pub fn delete(&self) -> DeleteQueryBuilder {
        DeleteQueryBuilder::new(self.clone())
    }

    pub fn update(&self, target: &str) -> UpdateQueryBuilder {
        UpdateQueryBuilder::new(self.clone()).table(target)
    }

    pub fn insert(&self) -> InsertQueryBuilder {
        InsertQueryBuilder::new(self.clone())
    }

    pub fn select<I, S>(&self, columns: I) -> SelectQueryBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectQueryBuilder::new(self.clone()).select(columns)
    }

    /// Run `f` inside a transaction on a dedicated runner.
    ///
    /// Builders given the runner through `with_query_runner` see the active
    /// transaction and neither commit nor release it. The transaction is
    /// committed when `f` succeeds and rolled back otherwise.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> OrmResult<T>
    where
        F: FnOnce(Arc<dyn QueryRunner>) -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        let runner = self.create_query_runner().await?;
        if let Err(err) = runner.start_transaction().await {
            self.release_quietly(&runner).await;
            return Err(err);
        }
        if self.options.logging.transactions {
            tracing::debug!(target: "querykit.tx", "transaction started");
        }

        let result = match f(Arc::clone(&runner)).await {
            Ok(value) => runner.commit_transaction().await.map(|()| value),
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => {
                if self.options.logging.transactions {
                    tracing::debug!(target: "querykit.tx", "transaction committed");
                }
            }
            Err(err) => {
                if runner.is_transaction_active() {
                    if let Err(rollback_err) = runner.rollback_transaction().await {
                        if self.options.logging.errors {
                            tracing::warn!(
                                target: "querykit.tx",
                                error = %rollback_err,
                                cause = %err,
                                "rollback failed"
                            );
                        }
                    } else if self.options.logging.transactions {
                        tracing::debug!(target: "querykit.tx", "transaction rolled back");
                    }
                }
            }
        }

        self.release_quietly(&runner).await;
        result
    }

    async fn release_quietly(&self, runner: &Arc<dyn QueryRunner>) {
        if let Err(err) = runner.release().await {
            if self.options.logging.errors {
                tracing::warn!(target: "querykit.tx", error = %err, "failed to release query runner");
            }
        }
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("dialect", &self.dialect().name())
            .field("entities", &self.metadata.len())
            .field("subscribers", &self.broadcaster.subscriber_count())
            .field("options", &self.options)
            .finish()
    }
}
