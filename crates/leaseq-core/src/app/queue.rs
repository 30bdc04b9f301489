//! Queue - the producer/consumer facade.
//!
//! Producer calls (`enqueue`, `remove_*`, `update_*`, inspection) go straight
//! to the repository and propagate errors. Consumers register workers; the
//! first registration arms the scheduler, whose failures only ever reach the
//! configured `ErrorHandler`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::builder::QueueBuilder;
use super::config::QueueConfig;
use super::dispatcher::{DispatchResult, Dispatcher};
use super::registry::WorkerRegistry;
use super::repository::{ItemRepository, UpdateOptions};
use super::scheduler::Scheduler;
use crate::domain::{EnqueueOptions, ItemId, ItemType, NewItem, QueueError, QueueItem};
use crate::ports::Worker;
use crate::typed::{Handler, Message, TypedWorker};

pub struct Queue {
    config: QueueConfig,
    repository: ItemRepository,
    registry: Arc<WorkerRegistry>,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
}

impl Queue {
    pub fn builder() -> QueueBuilder {
        QueueBuilder::new()
    }

    pub(crate) fn from_parts(
        config: QueueConfig,
        repository: ItemRepository,
        registry: Arc<WorkerRegistry>,
        dispatcher: Dispatcher,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            config,
            repository,
            registry,
            dispatcher,
            scheduler,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn repository(&self) -> &ItemRepository {
        &self.repository
    }

    /// Add an item. It becomes claimable at `options.next_receivable_time`
    /// (or immediately).
    pub async fn enqueue(
        &self,
        item_type: impl Into<ItemType>,
        message: Value,
        options: EnqueueOptions,
    ) -> Result<QueueItem, QueueError> {
        self.repository
            .insert(NewItem::new(item_type, message).with_options(options))
            .await
    }

    /// `enqueue` for a typed message.
    pub async fn enqueue_message<M: Message>(
        &self,
        message: &M,
        options: EnqueueOptions,
    ) -> Result<QueueItem, QueueError> {
        self.enqueue(M::item_type(), serde_json::to_value(message)?, options)
            .await
    }

    /// Insert an item already leased to this process and dispatch it right
    /// away, bypassing the scheduler.
    ///
    /// Every failure propagates. If dispatch fails the item stays leased and
    /// is picked up by polling once the visibility timeout lapses.
    pub async fn enqueue_and_process(
        &self,
        item_type: impl Into<ItemType>,
        message: Value,
    ) -> Result<DispatchResult, QueueError> {
        let mut new_item = NewItem::new(item_type, message);
        new_item.received_time = Some(self.repository.now());
        let mut item = self.repository.insert(new_item).await?;
        self.dispatcher.process(&mut item).await
    }

    /// Register (or replace) the worker for `item_type` and start polling.
    pub fn register_worker(&self, item_type: impl Into<ItemType>, worker: impl Worker + 'static) {
        self.register_arc(item_type.into(), Arc::new(worker));
    }

    /// Register a typed handler under `M::TYPE` and start polling.
    pub fn register<M: Message, H: Handler<M> + 'static>(&self, handler: H) {
        self.register_arc(M::item_type(), Arc::new(TypedWorker::<M, H>::new(handler)));
    }

    pub(crate) fn register_arc(&self, item_type: ItemType, worker: Arc<dyn Worker>) {
        if self.registry.register(item_type.clone(), worker).is_some() {
            debug!(item.type = %item_type, "replaced worker");
        } else {
            debug!(item.type = %item_type, "registered worker");
        }
        self.scheduler.start_polling();
    }

    pub fn registered_types(&self) -> Vec<ItemType> {
        self.registry.registered_types()
    }

    pub fn start_polling(&self) {
        self.scheduler.start_polling();
    }

    /// Stop claiming new items. Items already being processed finish.
    pub fn stop_polling(&self) {
        self.scheduler.stop_polling();
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_polling()
    }

    pub fn active_workers(&self) -> usize {
        self.scheduler.active_workers()
    }

    /// Delete the first item of `item_type` whose message matches `message_filter`.
    pub async fn remove_one(
        &self,
        item_type: impl Into<ItemType>,
        message_filter: &Value,
    ) -> Result<u64, QueueError> {
        self.repository.remove_one(&item_type.into(), message_filter).await
    }

    pub async fn remove_many(
        &self,
        item_type: impl Into<ItemType>,
        message_filter: &Value,
    ) -> Result<u64, QueueError> {
        self.repository.remove_many(&item_type.into(), message_filter).await
    }

    pub async fn update_one(
        &self,
        item_type: impl Into<ItemType>,
        message_filter: &Value,
        message_update: &Value,
        options: UpdateOptions,
    ) -> Result<u64, QueueError> {
        self.repository
            .update_one(&item_type.into(), message_filter, message_update, options)
            .await
    }

    pub async fn update_many(
        &self,
        item_type: impl Into<ItemType>,
        message_filter: &Value,
        message_update: &Value,
        options: UpdateOptions,
    ) -> Result<u64, QueueError> {
        self.repository
            .update_many(&item_type.into(), message_filter, message_update, options)
            .await
    }

    pub async fn get(&self, id: ItemId) -> Result<Option<QueueItem>, QueueError> {
        self.repository.get(id).await
    }

    pub async fn count(&self, item_type: impl Into<ItemType>) -> Result<u64, QueueError> {
        self.repository.count(&item_type.into()).await
    }

    pub async fn find(&self, item_type: impl Into<ItemType>) -> Result<Vec<QueueItem>, QueueError> {
        self.repository.find(&item_type.into()).await
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.scheduler.stop_polling();
    }
}
