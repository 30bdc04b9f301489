//! Typed - message types instead of raw JSON.
//!
//! `Message` binds a Rust type to an item type string, and `Handler<M>`
//! receives the decoded message. `TypedWorker` erases both back into the
//! untyped `Worker` the registry stores, so typed and untyped workers can be
//! mixed on one queue.

pub mod handler;
pub mod message;

pub use self::handler::{Handler, TypedWorker};
pub use self::message::Message;
