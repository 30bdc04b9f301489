//! DocumentStore port - the durable store behind the queue.
//!
//! The queue only needs a handful of document operations, all scoped to a
//! collection (namespace). The one hard requirement is that
//! `find_one_and_update` is atomic: two concurrent callers with the same
//! filter must never both match and update the same document. Lease
//! correctness across processes rests entirely on that.

use async_trait::async_trait;

use crate::domain::StoreError;
use crate::query::{Document, Filter, SortKey, Update};

/// Which version of the document `find_one_and_update` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    Before,
    #[default]
    After,
}

#[derive(Debug, Clone, Default)]
pub struct FindOneAndUpdateOptions {
    /// Candidates are ordered by these keys; the first match wins.
    pub sort: Vec<SortKey>,
    pub return_document: ReturnDocument,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document; the store assigns `_id` and returns the stored document.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// Atomically find the first matching document (per `options.sort`) and update it.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError>;

    /// All matching documents, in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}
