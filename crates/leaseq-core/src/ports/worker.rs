//! Worker port - application-supplied processing logic.

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{Outcome, QueueError, QueueItem};

/// Processes claimed items of one type.
///
/// The worker gets the claimed item mutably: before returning `Retry` it may
/// set `released_reason` / `next_receivable_time`, before `Rejected` it may
/// set `rejection_reason` / `released_reason`.
///
/// Returning `Err` issues no transition at all: the error goes to the error
/// handler and the item stays leased until its visibility timeout lapses.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn process(&self, item: &mut QueueItem) -> Result<Outcome, QueueError>;
}

/// Adapter for closures that only need to read the item.
///
/// The closure receives a clone, so `released_reason`,
/// `next_receivable_time` and `rejection_reason` set on it are lost.
/// Implement `Worker` directly when those must reach the store.
pub struct FnWorker<F> {
    f: F,
}

/// Wrap an async closure as a `Worker`.
///
/// ```ignore
/// queue.register_worker("ping", worker_fn(|_item| async { Ok(Outcome::Completed) }));
/// ```
pub fn worker_fn<F, Fut>(f: F) -> FnWorker<F>
where
    F: Fn(QueueItem) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outcome, QueueError>> + Send,
{
    FnWorker { f }
}

#[async_trait]
impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(QueueItem) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outcome, QueueError>> + Send,
{
    async fn process(&self, item: &mut QueueItem) -> Result<Outcome, QueueError> {
        (self.f)(item.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> QueueItem {
        serde_json::from_value(json!({
            "_id": ulid::Ulid::new().to_string(),
            "type": "x",
            "message": {},
            "dateCreated": 0,
        }))
        .unwrap()
    }

    struct Flaky;

    #[async_trait]
    impl Worker for Flaky {
        async fn process(&self, item: &mut QueueItem) -> Result<Outcome, QueueError> {
            item.released_reason = Some("upstream timeout".into());
            Ok(Outcome::Retry)
        }
    }

    #[tokio::test]
    async fn closure_workers_see_a_copy() {
        let worker = worker_fn(|mut item: QueueItem| async move {
            item.released_reason = Some("lost".into());
            Ok(Outcome::Retry)
        });
        let mut claimed = item();

        assert_eq!(worker.process(&mut claimed).await.unwrap(), Outcome::Retry);
        assert!(claimed.released_reason.is_none());
    }

    #[tokio::test]
    async fn trait_workers_mutate_the_claimed_item() {
        let mut claimed = item();
        assert_eq!(Flaky.process(&mut claimed).await.unwrap(), Outcome::Retry);
        assert_eq!(claimed.released_reason.as_deref(), Some("upstream timeout"));
    }
}
