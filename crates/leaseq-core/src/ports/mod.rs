//! Ports - the seams between the queue core and the outside world.
//!
//! Each trait hides one external collaborator: the durable store, the
//! application's workers, the error sink, time, and id generation.

pub mod clock;
pub mod document_store;
pub mod error_handler;
pub mod id_generator;
pub mod worker;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::document_store::{DocumentStore, FindOneAndUpdateOptions, ReturnDocument};
pub use self::error_handler::{ErrorHandler, LogErrorHandler};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::worker::{FnWorker, Worker, worker_fn};
