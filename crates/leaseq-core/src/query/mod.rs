//! Query model handed to `DocumentStore` backends: documents, filters,
//! updates and sort keys.

pub mod filter;
pub mod path;
pub mod sort;
pub mod update;

pub use self::filter::Filter;
pub use self::sort::{SortKey, SortOrder};
pub use self::update::Update;

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;
