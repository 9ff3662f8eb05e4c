//! Entity lifecycle subscribers and the broadcaster that fans events out.
//!
//! The executor never awaits subscribers one by one. Each broadcast call
//! pushes the pending work of every interested subscriber into a
//! [`BroadcasterResult`]; the executor then awaits the whole group with
//! [`BroadcasterResult::wait`], so independent subscribers run concurrently
//! while the statement itself waits for all of them.

use crate::error::OrmResult;
use crate::metadata::EntityMetadata;
use futures_util::future::{BoxFuture, try_join_all};
use std::fmt;
use std::sync::Arc;

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeRemove,
    AfterRemove,
}

/// Event payload handed to subscribers.
#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub kind: EventKind,
    pub metadata: Arc<EntityMetadata>,
}

/// Receives lifecycle events for mapped entities.
///
/// Every method returns a future; the default implementations do nothing.
pub trait EntitySubscriber: Send + Sync {
    /// Restrict this subscriber to one entity name. `None` listens to all.
    fn listen_to(&self) -> Option<&str> {
        None
    }

    fn before_insert(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        let _ = event;
        Box::pin(async { Ok(()) })
    }

    fn after_insert(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        let _ = event;
        Box::pin(async { Ok(()) })
    }

    fn before_update(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        let _ = event;
        Box::pin(async { Ok(()) })
    }

    fn after_update(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        let _ = event;
        Box::pin(async { Ok(()) })
    }

    fn before_remove(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        let _ = event;
        Box::pin(async { Ok(()) })
    }

    fn after_remove(&self, event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
        let _ = event;
        Box::pin(async { Ok(()) })
    }
}

/// Pending subscriber work collected during one broadcast.
#[derive(Default)]
pub struct BroadcasterResult {
    futures: Vec<BoxFuture<'static, OrmResult<()>>>,
}

impl BroadcasterResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, future: BoxFuture<'static, OrmResult<()>>) {
        self.futures.push(future);
    }

    pub fn len(&self) -> usize {
        self.futures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    /// Await every pending future. The first failure is returned.
    pub async fn wait(self) -> OrmResult<()> {
        if self.futures.is_empty() {
            return Ok(());
        }
        try_join_all(self.futures).await.map(|_| ())
    }
}

impl fmt::Debug for BroadcasterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcasterResult")
            .field("pending", &self.futures.len())
            .finish()
    }
}

/// Dispatches lifecycle events to registered subscribers.
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Vec<Arc<dyn EntitySubscriber>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&mut self, subscriber: Arc<dyn EntitySubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Push the work of every subscriber interested in `metadata` for `kind`.
    pub fn broadcast(
        &self,
        result: &mut BroadcasterResult,
        kind: EventKind,
        metadata: &Arc<EntityMetadata>,
    ) {
        for subscriber in &self.subscribers {
            if let Some(target) = subscriber.listen_to() {
                if target != metadata.name() {
                    continue;
                }
            }
            let event = EntityEvent {
                kind,
                metadata: Arc::clone(metadata),
            };
            let future = match kind {
                EventKind::BeforeInsert => subscriber.before_insert(event),
                EventKind::AfterInsert => subscriber.after_insert(event),
                EventKind::BeforeUpdate => subscriber.before_update(event),
                EventKind::AfterUpdate => subscriber.after_update(event),
                EventKind::BeforeRemove => subscriber.before_remove(event),
                EventKind::AfterRemove => subscriber.after_remove(event),
            };
            result.push(future);
        }
    }

    pub fn broadcast_before_remove_event(
        &self,
        result: &mut BroadcasterResult,
        metadata: &Arc<EntityMetadata>,
    ) {
        self.broadcast(result, EventKind::BeforeRemove, metadata);
    }

    pub fn broadcast_after_remove_event(
        &self,
        result: &mut BroadcasterResult,
        metadata: &Arc<EntityMetadata>,
    ) {
        self.broadcast(result, EventKind::AfterRemove, metadata);
    }

    pub fn broadcast_before_insert_event(
        &self,
        result: &mut BroadcasterResult,
        metadata: &Arc<EntityMetadata>,
    ) {
        self.broadcast(result, EventKind::BeforeInsert, metadata);
    }

    pub fn broadcast_after_insert_event(
        &self,
        result: &mut BroadcasterResult,
        metadata: &Arc<EntityMetadata>,
    ) {
        self.broadcast(result, EventKind::AfterInsert, metadata);
    }

    pub fn broadcast_before_update_event(
        &self,
        result: &mut BroadcasterResult,
        metadata: &Arc<EntityMetadata>,
    ) {
        self.broadcast(result, EventKind::BeforeUpdate, metadata);
    }

    pub fn broadcast_after_update_event(
        &self,
        result: &mut BroadcasterResult,
        metadata: &Arc<EntityMetadata>,
    ) {
        self.broadcast(result, EventKind::AfterUpdate, metadata);
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::metadata::ColumnOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        entity: Option<&'static str>,
        removes: Arc<AtomicUsize>,
    }

    impl EntitySubscriber for Counting {
        fn listen_to(&self) -> Option<&str> {
            self.entity
        }

        fn before_remove(&self, _event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
            let removes = Arc::clone(&self.removes);
            Box::pin(async move {
                removes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    struct Failing;

    impl EntitySubscriber for Failing {
        fn before_remove(&self, _event: EntityEvent) -> BoxFuture<'static, OrmResult<()>> {
            Box::pin(async { Err(QueryError::hook("refused")) })
        }
    }

    fn category() -> Arc<EntityMetadata> {
        Arc::new(
            EntityMetadata::builder("Category")
                .primary_column("id", ColumnOptions::new().column_type("integer"))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn filters_by_listen_to() {
        let removes = Arc::new(AtomicUsize::new(0));
        let mut broadcaster = Broadcaster::new();
        broadcaster.add_subscriber(Arc::new(Counting {
            entity: Some("Category"),
            removes: Arc::clone(&removes),
        }));
        broadcaster.add_subscriber(Arc::new(Counting {
            entity: Some("Post"),
            removes: Arc::clone(&removes),
        }));

        let mut result = BroadcasterResult::new();
        broadcaster.broadcast_before_remove_event(&mut result, &category());
        assert_eq!(result.len(), 1);
        result.wait().await.unwrap();
        assert_eq!(removes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_surfaces_from_wait() {
        let mut broadcaster = Broadcaster::new();
        broadcaster.add_subscriber(Arc::new(Failing));

        let mut result = BroadcasterResult::new();
        broadcaster.broadcast_before_remove_event(&mut result, &category());
        let err = result.wait().await.unwrap_err();
        assert!(matches!(err, QueryError::Hook(_)));
    }
}
