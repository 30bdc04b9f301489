//! App - the queue itself, assembled from the ports.
//!
//! # Components
//! - **ItemRepository**: item state transitions as document store calls
//! - **WorkerRegistry**: item type to worker
//! - **Dispatcher**: runs a worker, routes its outcome to a transition
//! - **Scheduler**: timer + drain driven polling under a concurrency cap
//! - **Queue / QueueBuilder**: public facade and its wiring
//! - **QueueConfig**: defaults, env overrides

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod queue;
pub mod registry;
pub mod repository;
pub mod scheduler;

pub use self::builder::{BuildError, QueueBuilder};
pub use self::config::QueueConfig;
pub use self::dispatcher::{DispatchResult, Dispatcher};
pub use self::queue::Queue;
pub use self::registry::WorkerRegistry;
pub use self::repository::{ItemRepository, UpdateOptions};
pub use self::scheduler::{CycleState, Scheduler, SchedulerSettings};
