//! leaseq-core
//!
//! A durable work queue over a document store. Items are claimed with an
//! atomic find-and-modify that sets a lease (`receivedTime`); a worker's
//! outcome then completes, releases or rejects the item. Leases that are
//! never resolved expire after the processing timeout and the item becomes
//! claimable again, so any number of processes can share one collection.
//!
//! # Modules
//! - **domain**: items, ids, outcomes, errors
//! - **query**: filter / update / sort model handed to stores
//! - **ports**: `DocumentStore`, `Worker`, `ErrorHandler`, `Clock`, `IdGenerator`
//! - **app**: repository, registry, dispatcher, scheduler, `Queue`
//! - **typed**: `Message` / `Handler<M>` over the untyped worker API
//! - **impls**: in-memory store for development and tests

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod query;
pub mod typed;

pub use crate::app::{
    BuildError, DispatchResult, Queue, QueueBuilder, QueueConfig, UpdateOptions,
};
pub use crate::domain::{
    EnqueueOptions, ItemId, ItemType, Outcome, Priority, QueueError, QueueItem, ReleaseRecord,
    StoreError,
};
pub use crate::impls::InMemoryStore;
pub use crate::ports::{DocumentStore, ErrorHandler, Worker, worker_fn};
pub use crate::typed::{Handler, Message};
