//! Handler trait and its type-erased adapter.

use std::marker::PhantomData;

use async_trait::async_trait;

use super::message::Message;
use crate::domain::{Outcome, QueueError, QueueItem};
use crate::ports::Worker;

/// Processes decoded messages of type `M`.
///
/// The raw item is passed alongside for its metadata (retry count, release
/// history) and so the handler can set `released_reason`,
/// `next_receivable_time` or `rejection_reason` before returning.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync {
    async fn handle(&self, message: M, item: &mut QueueItem) -> Result<Outcome, QueueError>;
}

/// `Handler<M>` as a plain `Worker`.
///
/// A payload that does not decode into `M` is a worker error: it goes to the
/// error handler and the item stays leased.
pub struct TypedWorker<M: Message, H: Handler<M>> {
    handler: H,
    _marker: PhantomData<M>,
}

impl<M: Message, H: Handler<M>> TypedWorker<M, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message, H: Handler<M>> Worker for TypedWorker<M, H> {
    async fn process(&self, item: &mut QueueItem) -> Result<Outcome, QueueError> {
        let message: M = item.decode()?;
        self.handler.handle(message, item).await
    }
}
