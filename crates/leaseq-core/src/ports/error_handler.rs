//! ErrorHandler port - where scheduler-side failures end up.
//!
//! Claim errors, missing workers, worker failures and failed transitions are
//! never thrown out of the polling loop. They are handed to one handler per
//! queue, together with the item when there is one.

use tracing::{error, warn};

use crate::domain::{QueueError, QueueItem};

pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &QueueError, item: Option<&QueueItem>);
}

/// Default handler: transient store outages at warn level, the rest at
/// error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, error: &QueueError, item: Option<&QueueItem>) {
        if !error.is_permanent() {
            match item {
                Some(item) => warn!(item.id = %item.id, "queue error, will retry: {error}"),
                None => warn!("queue error, will retry: {error}"),
            }
            return;
        }
        match item {
            Some(item) => error!(
                item.id = %item.id,
                item.type = %item.item_type,
                retry_count = item.retry_count(),
                "queue error: {error}"
            ),
            None => error!("queue error: {error}"),
        }
    }
}

impl<F> ErrorHandler for F
where
    F: Fn(&QueueError, Option<&QueueItem>) + Send + Sync,
{
    fn handle(&self, error: &QueueError, item: Option<&QueueItem>) {
        self(error, item)
    }
}
