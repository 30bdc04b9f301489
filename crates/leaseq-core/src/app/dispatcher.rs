//! Dispatcher - runs the worker for a claimed item and routes its outcome.
//!
//! | Outcome     | Transition                    |
//! |-------------|-------------------------------|
//! | `Completed` | `ItemRepository::complete`    |
//! | `Retry`     | `ItemRepository::release`     |
//! | `Rejected`  | `ItemRepository::reject`      |
//!
//! A missing worker or a worker error performs no transition. The item keeps
//! its lease and becomes claimable again once the visibility timeout lapses.

use std::sync::Arc;

use tracing::{Instrument, debug, info_span, trace, warn};

use super::registry::WorkerRegistry;
use super::repository::ItemRepository;
use super::scheduler::CycleState;
use crate::domain::{ItemId, Outcome, QueueError, QueueItem};

/// What happened to a dispatched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    pub item_id: ItemId,
    pub outcome: Outcome,
    /// Documents touched by the transition (0 if the item vanished meanwhile).
    pub affected: u64,
}

#[derive(Clone)]
pub struct Dispatcher {
    repository: ItemRepository,
    registry: Arc<WorkerRegistry>,
}

impl Dispatcher {
    pub fn new(repository: ItemRepository, registry: Arc<WorkerRegistry>) -> Self {
        Self { repository, registry }
    }

    /// Process one claimed item.
    ///
    /// The item is borrowed mutably so the caller still has it (with any
    /// fields the worker filled in) when reporting an error.
    pub async fn process(&self, item: &mut QueueItem) -> Result<DispatchResult, QueueError> {
        let span = info_span!(
            "item",
            item.id = %item.id,
            item.type = %item.item_type,
            retry_count = item.retry_count()
        );
        self.process_inner(item).instrument(span).await
    }

    async fn process_inner(&self, item: &mut QueueItem) -> Result<DispatchResult, QueueError> {
        let Some(worker) = self.registry.get(&item.item_type) else {
            return Err(QueueError::NoWorkerRegistered(item.item_type.clone()));
        };

        trace!(state = %CycleState::Dispatching, "invoking worker");
        let outcome = match worker.process(item).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "worker failed, item stays leased");
                return Err(err);
            }
        };

        let affected = match outcome {
            Outcome::Completed => {
                trace!(state = %CycleState::Completing, "completing");
                self.repository.complete(item.id).await?
            }
            Outcome::Retry => {
                trace!(state = %CycleState::Releasing, "releasing");
                self.repository.release(item).await?
            }
            Outcome::Rejected => {
                trace!(state = %CycleState::Rejecting, "rejecting");
                self.repository.reject(item).await?
            }
        };
        debug!(outcome = %outcome, affected, "dispatched");

        Ok(DispatchResult {
            item_id: item.id,
            outcome,
            affected,
        })
    }
}
