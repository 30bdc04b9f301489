//! QueueBuilder - wiring and start-up validation.
//!
//! `build()` fails fast on settings the queue cannot run with, and on item
//! types declared with `expect_types` that have no worker.

use std::sync::Arc;

use super::config::QueueConfig;
use super::dispatcher::Dispatcher;
use super::queue::Queue;
use super::registry::WorkerRegistry;
use super::repository::ItemRepository;
use super::scheduler::{Scheduler, SchedulerSettings};
use crate::domain::ItemType;
use crate::ports::{Clock, DocumentStore, ErrorHandler, LogErrorHandler, SystemClock, Worker};
use crate::typed::{Handler, Message, TypedWorker};

/// ```ignore
/// let queue = Queue::builder()
///     .config(QueueConfig::from_env()?)
///     .store(InMemoryStore::new())
///     .register::<SendEmail, _>(EmailHandler)
///     .expect_types(&[SendEmail::TYPE])
///     .build()?;
/// ```
pub struct QueueBuilder {
    config: QueueConfig,
    store: Option<Arc<dyn DocumentStore>>,
    clock: Arc<dyn Clock>,
    error_handler: Arc<dyn ErrorHandler>,
    workers: Vec<(ItemType, Arc<dyn Worker>)>,
    expected_types: Option<Vec<ItemType>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("poll_interval_ms must be at least 1")]
    ZeroPollInterval,

    #[error("processing_timeout_ms must be at least 1")]
    ZeroProcessingTimeout,

    #[error("item types expected but not registered: {0:?}")]
    MissingItemTypes(Vec<String>),
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            store: None,
            clock: Arc::new(SystemClock),
            error_handler: Arc::new(LogErrorHandler),
            workers: Vec::new(),
            expected_types: None,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn processing_timeout_ms(mut self, ms: u64) -> Self {
        self.config.processing_timeout_ms = ms;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Without a store every queue operation fails with `StoreUnavailable`.
    pub fn store(self, store: impl DocumentStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Share one store between several queues.
    pub fn shared_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn register_worker(mut self, item_type: impl Into<ItemType>, worker: impl Worker + 'static) -> Self {
        self.workers.push((item_type.into(), Arc::new(worker)));
        self
    }

    pub fn register<M: Message, H: Handler<M> + 'static>(mut self, handler: H) -> Self {
        self.workers
            .push((M::item_type(), Arc::new(TypedWorker::<M, H>::new(handler))));
        self
    }

    /// Item types that must have a worker by the time `build()` runs.
    pub fn expect_types(mut self, item_types: &[&str]) -> Self {
        self.expected_types = Some(item_types.iter().map(|t| ItemType::new(*t)).collect());
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.config.max_concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        if self.config.poll_interval_ms == 0 {
            return Err(BuildError::ZeroPollInterval);
        }
        if self.config.processing_timeout_ms == 0 {
            return Err(BuildError::ZeroProcessingTimeout);
        }
        if let Some(expected) = &self.expected_types {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.workers.iter().any(|(registered, _)| registered == *t))
                .map(|t| t.as_str().to_string())
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingItemTypes(missing));
            }
        }
        Ok(())
    }

    /// Wire the queue. Workers registered here start polling immediately,
    /// which needs a tokio runtime; build inside one when registering workers.
    pub fn build(self) -> Result<Queue, BuildError> {
        self.validate()?;

        let repository = ItemRepository::new(
            self.store,
            self.config.collection_name.clone(),
            self.clock,
            self.config.processing_timeout(),
        );
        let registry = Arc::new(WorkerRegistry::new());
        let dispatcher = Dispatcher::new(repository.clone(), Arc::clone(&registry));
        let scheduler = Scheduler::new(
            SchedulerSettings {
                poll_interval: self.config.poll_interval(),
                max_concurrency: self.config.max_concurrency,
            },
            repository.clone(),
            dispatcher.clone(),
            Arc::clone(&registry),
            self.error_handler,
        );

        let queue = Queue::from_parts(self.config, repository, registry, dispatcher, scheduler);
        for (item_type, worker) in self.workers {
            queue.register_arc(item_type, worker);
        }
        Ok(queue)
    }
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, QueueError, QueueItem};
    use crate::impls::InMemoryStore;
    use crate::ports::worker_fn;
    use async_trait::async_trait;
    use rstest::rstest;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Report {
        id: u64,
    }

    impl Message for Report {
        const TYPE: &'static str = "report.build";
    }

    struct ReportHandler;

    #[async_trait]
    impl Handler<Report> for ReportHandler {
        async fn handle(&self, _message: Report, _item: &mut QueueItem) -> Result<Outcome, QueueError> {
            Ok(Outcome::Completed)
        }
    }

    #[tokio::test]
    async fn build_with_expected_types() {
        let queue = QueueBuilder::new()
            .store(InMemoryStore::new())
            .register::<Report, _>(ReportHandler)
            .register_worker("cleanup", worker_fn(|_item| async { Ok(Outcome::Completed) }))
            .expect_types(&[Report::TYPE, "cleanup"])
            .build()
            .unwrap();

        assert!(queue.is_polling());
        assert_eq!(
            queue.registered_types(),
            vec![ItemType::new("cleanup"), ItemType::new(Report::TYPE)]
        );
        queue.stop_polling();
    }

    #[test]
    fn build_missing_item_types() {
        let queue = QueueBuilder::new()
            .expect_types(&[Report::TYPE, "cleanup"])
            .build();
        assert!(matches!(
            queue,
            Err(BuildError::MissingItemTypes(missing))
                if missing == vec![Report::TYPE.to_string(), "cleanup".to_string()]
        ));
    }

    #[rstest]
    #[case::zero_concurrency(QueueBuilder::new().max_concurrency(0), "max_concurrency")]
    #[case::zero_interval(QueueBuilder::new().poll_interval_ms(0), "poll_interval_ms")]
    #[case::zero_timeout(QueueBuilder::new().processing_timeout_ms(0), "processing_timeout_ms")]
    fn build_rejects_unusable_settings(#[case] builder: QueueBuilder, #[case] field: &str) {
        match builder.build() {
            Err(err) => assert!(err.to_string().contains(field)),
            Ok(_) => panic!("expected a build error"),
        }
    }

    #[test]
    fn setters_override_config() {
        let queue = QueueBuilder::new()
            .config(QueueConfig {
                max_concurrency: 9,
                ..QueueConfig::default()
            })
            .poll_interval_ms(50)
            .collection_name("jobs")
            .build()
            .unwrap();

        assert_eq!(queue.config().max_concurrency, 9);
        assert_eq!(queue.config().poll_interval_ms, 50);
        assert_eq!(queue.repository().collection(), "jobs");
    }
}
