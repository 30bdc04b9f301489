//! Scheduler - the polling loop.
//!
//! A single control task owns the in-flight counter and the armed flag. It
//! reacts to three inputs:
//!
//! - the poll timer (only while armed)
//! - `Start` / `Stop` from `start_polling` / `stop_polling`
//! - `Finished` from poll cycles, carrying whether the cycle processed an item
//!
//! Each admitted cycle runs on its own tokio task and holds a `Permit`. The
//! permit reports `Finished` when dropped, so the counter is decremented
//! exactly once per cycle even if the worker panics. A cycle that processed
//! an item asks for an immediate follow-up poll ("drain"), which is how a
//! backlog empties faster than one item per tick.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::dispatcher::Dispatcher;
use super::registry::WorkerRegistry;
use super::repository::ItemRepository;
use crate::ports::ErrorHandler;

/// Where a poll cycle is. Only used for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Polling,
    Claimed,
    Dispatching,
    Completing,
    Releasing,
    Rejecting,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::Polling => "polling",
            CycleState::Claimed => "claimed",
            CycleState::Dispatching => "dispatching",
            CycleState::Completing => "completing",
            CycleState::Releasing => "releasing",
            CycleState::Rejecting => "rejecting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub max_concurrency: usize,
}

#[derive(Debug)]
enum Signal {
    Start,
    Stop,
    Finished { drained: bool },
}

/// Everything a poll cycle needs, shared by all cycles.
struct CycleContext {
    repository: ItemRepository,
    dispatcher: Dispatcher,
    registry: Arc<WorkerRegistry>,
    error_handler: Arc<dyn ErrorHandler>,
}

/// Snapshot mirrored out of the control loop.
#[derive(Default)]
struct Status {
    active: AtomicUsize,
    polling: AtomicBool,
}

pub struct Scheduler {
    settings: SchedulerSettings,
    context: Arc<CycleContext>,
    status: Arc<Status>,
    /// Sender into the control loop, created on first `start_polling`.
    control: Mutex<Option<UnboundedSender<Signal>>>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        repository: ItemRepository,
        dispatcher: Dispatcher,
        registry: Arc<WorkerRegistry>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            settings,
            context: Arc::new(CycleContext {
                repository,
                dispatcher,
                registry,
                error_handler,
            }),
            status: Arc::new(Status::default()),
            control: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Arm the poll timer. The first cycle runs one interval from now.
    /// Calling this while already polling changes nothing.
    ///
    /// Must be called from within a tokio runtime; outside one the call is
    /// logged and ignored.
    pub fn start_polling(&self) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.is_none() {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!("start_polling called outside a tokio runtime, ignoring");
                return;
            };
            let (tx, rx) = mpsc::unbounded_channel();
            let control_loop = ControlLoop {
                context: Arc::clone(&self.context),
                status: Arc::clone(&self.status),
                signals: tx.downgrade(),
                max_concurrency: self.settings.max_concurrency,
                active: 0,
                armed: false,
            };
            runtime.spawn(control_loop.run(rx, self.settings.poll_interval));
            *control = Some(tx);
        }

        if let Some(tx) = control.as_ref() {
            self.status.polling.store(true, Ordering::SeqCst);
            let _ = tx.send(Signal::Start);
        }
    }

    /// Disarm the timer. In-flight cycles run to completion but request no
    /// follow-up polls.
    pub fn stop_polling(&self) {
        let control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        self.status.polling.store(false, Ordering::SeqCst);
        if let Some(tx) = control.as_ref() {
            let _ = tx.send(Signal::Stop);
        }
    }

    pub fn is_polling(&self) -> bool {
        self.status.polling.load(Ordering::SeqCst)
    }

    /// Poll cycles currently in flight.
    pub fn active_workers(&self) -> usize {
        self.status.active.load(Ordering::SeqCst)
    }
}

struct ControlLoop {
    context: Arc<CycleContext>,
    status: Arc<Status>,
    // Weak so that dropping the Scheduler closes the channel once the last
    // in-flight cycle has reported back.
    signals: WeakUnboundedSender<Signal>,
    max_concurrency: usize,
    active: usize,
    armed: bool,
}

impl ControlLoop {
    async fn run(mut self, mut rx: UnboundedReceiver<Signal>, poll_interval: Duration) {
        let mut interval = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                signal = rx.recv() => {
                    let Some(signal) = signal else { break };
                    match signal {
                        Signal::Start => {
                            if !self.armed {
                                self.armed = true;
                                interval.reset();
                                debug!(?poll_interval, "polling started");
                            }
                        }
                        Signal::Stop => {
                            if self.armed {
                                self.armed = false;
                                debug!(active = self.active, "polling stopped");
                            }
                        }
                        Signal::Finished { drained } => {
                            self.active = self.active.saturating_sub(1);
                            if drained && self.armed {
                                self.poll();
                            }
                        }
                    }
                }
                _ = interval.tick(), if self.armed => self.poll(),
            }
            self.status.active.store(self.active, Ordering::SeqCst);
        }
        trace!("scheduler control loop exited");
    }

    /// Admit one poll cycle if below the concurrency limit.
    fn poll(&mut self) {
        if self.active >= self.max_concurrency {
            trace!(active = self.active, "at max concurrency, skipping poll");
            return;
        }
        let Some(signals) = self.signals.upgrade() else {
            return;
        };
        self.active += 1;
        trace!(active = self.active, state = %CycleState::Polling, "poll cycle admitted");

        let permit = Permit {
            signals,
            drained: false,
        };
        tokio::spawn(run_cycle(Arc::clone(&self.context), permit));
    }
}

/// Held by a running cycle; reports `Finished` to the control loop on drop.
struct Permit {
    signals: UnboundedSender<Signal>,
    drained: bool,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.signals.send(Signal::Finished {
            drained: self.drained,
        });
    }
}

async fn run_cycle(context: Arc<CycleContext>, mut permit: Permit) {
    let types = context.registry.registered_types();
    let mut item = match context.repository.claim(&types).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            trace!(state = %CycleState::Idle, "nothing to claim");
            return;
        }
        Err(err) => {
            // claim errors stay inside the loop
            context.error_handler.handle(&err, None);
            return;
        }
    };
    trace!(item.id = %item.id, state = %CycleState::Claimed, "claimed");

    match context.dispatcher.process(&mut item).await {
        Ok(_) => permit.drained = true,
        Err(err) => context.error_handler.handle(&err, Some(&item)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemType, NewItem, Outcome, QueueError, QueueItem};
    use crate::impls::InMemoryStore;
    use crate::ports::{SystemClock, worker_fn};
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    struct Harness {
        scheduler: Scheduler,
        repository: ItemRepository,
        registry: Arc<WorkerRegistry>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    fn harness(max_concurrency: usize) -> Harness {
        harness_polling_every(Duration::from_millis(10), max_concurrency)
    }

    fn harness_polling_every(poll_interval: Duration, max_concurrency: usize) -> Harness {
        let repository = ItemRepository::new(
            Some(Arc::new(InMemoryStore::new())),
            "queue",
            Arc::new(SystemClock),
            chrono::Duration::seconds(30),
        );
        let registry = Arc::new(WorkerRegistry::new());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let handler = move |err: &QueueError, _item: Option<&QueueItem>| {
            sink.lock().unwrap().push(err.to_string());
        };
        let scheduler = Scheduler::new(
            SchedulerSettings {
                poll_interval,
                max_concurrency,
            },
            repository.clone(),
            Dispatcher::new(repository.clone(), Arc::clone(&registry)),
            Arc::clone(&registry),
            Arc::new(handler),
        );
        Harness {
            scheduler,
            repository,
            registry,
            errors,
        }
    }

    async fn eventually(mut condition: impl AsyncFnMut() -> bool) {
        for _ in 0..200 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 2s");
    }

    #[test]
    fn cycle_state_display() {
        assert_eq!(CycleState::Dispatching.to_string(), "dispatching");
        assert_eq!(CycleState::Idle.to_string(), "idle");
    }

    #[test]
    fn start_outside_runtime_is_ignored() {
        let h = harness(1);
        h.scheduler.start_polling();
        assert!(!h.scheduler.is_polling());
    }

    #[tokio::test]
    async fn drains_backlog_and_stops() {
        let h = harness(2);
        let processed = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&processed);
        h.registry.register(
            ItemType::new("x"),
            Arc::new(worker_fn(move |_item| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Outcome::Completed)
                }
            })),
        );
        for n in 0..20 {
            h.repository.insert(NewItem::new("x", json!({"n": n}))).await.unwrap();
        }

        h.scheduler.start_polling();
        h.scheduler.start_polling();
        assert!(h.scheduler.is_polling());

        let repository = h.repository.clone();
        eventually(async || repository.count(&ItemType::new("x")).await.unwrap() == 0).await;
        assert_eq!(processed.load(Ordering::SeqCst), 20);

        h.scheduler.stop_polling();
        assert!(!h.scheduler.is_polling());
        eventually(async || h.scheduler.active_workers() == 0).await;
    }

    #[tokio::test]
    async fn claim_errors_go_to_the_error_handler() {
        let store = Arc::new(InMemoryStore::new());
        let repository = ItemRepository::new(
            Some(store.clone()),
            "queue",
            Arc::new(SystemClock),
            chrono::Duration::seconds(30),
        );
        let registry = Arc::new(WorkerRegistry::new());
        registry.register(
            ItemType::new("x"),
            Arc::new(worker_fn(|_item| async { Ok(Outcome::Completed) })),
        );
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&errors);
        let scheduler = Scheduler::new(
            SchedulerSettings {
                poll_interval: Duration::from_millis(10),
                max_concurrency: 1,
            },
            repository.clone(),
            Dispatcher::new(repository, Arc::clone(&registry)),
            registry,
            Arc::new(move |err: &QueueError, item: Option<&QueueItem>| {
                assert!(item.is_none());
                sink.lock().unwrap().push(err.to_string());
            }),
        );

        store.set_offline(true);
        scheduler.start_polling();
        eventually(async || errors.lock().unwrap().len() >= 2).await;
        scheduler.stop_polling();

        assert!(errors.lock().unwrap().iter().all(|e| e.contains("unavailable")));
    }

    #[tokio::test]
    async fn worker_errors_are_reported_and_the_lease_kept() {
        let h = harness(1);
        h.registry.register(
            ItemType::new("x"),
            Arc::new(worker_fn(|_item| async { Err(QueueError::worker("boom")) })),
        );
        h.repository.insert(NewItem::new("x", json!({}))).await.unwrap();

        h.scheduler.start_polling();
        let errors = Arc::clone(&h.errors);
        eventually(async || !errors.lock().unwrap().is_empty()).await;
        h.scheduler.stop_polling();

        assert_eq!(h.errors.lock().unwrap()[0], "worker failed: boom");
        let items = h.repository.find(&ItemType::new("x")).await.unwrap();
        assert!(items[0].received_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dispatch_waits_for_the_next_tick() {
        let h = harness_polling_every(Duration::from_secs(10), 1);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        h.registry.register(
            ItemType::new("x"),
            Arc::new(worker_fn(move |_item| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(QueueError::worker("boom")) }
            })),
        );
        for n in 0..5 {
            h.repository.insert(NewItem::new("x", json!({"n": n}))).await.unwrap();
        }

        h.scheduler.start_polling();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.errors.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        h.scheduler.stop_polling();
    }

    #[tokio::test(start_paused = true)]
    async fn successful_dispatch_drains_within_one_tick() {
        let h = harness_polling_every(Duration::from_secs(10), 1);
        h.registry.register(
            ItemType::new("x"),
            Arc::new(worker_fn(|_item| async { Ok(Outcome::Completed) })),
        );
        for n in 0..5 {
            h.repository.insert(NewItem::new("x", json!({"n": n}))).await.unwrap();
        }

        h.scheduler.start_polling();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(h.repository.count(&ItemType::new("x")).await.unwrap(), 0);
        h.scheduler.stop_polling();
    }
}
