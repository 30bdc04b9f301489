//! Impls - port implementations for development and tests.
//!
//! Production backends implement `DocumentStore` in their own crates.

pub mod inmem_store;

pub use self::inmem_store::InMemoryStore;
