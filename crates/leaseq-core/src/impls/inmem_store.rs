//! InMemoryStore - document store for development and tests.
//!
//! Collections are insertion-ordered `Vec<Document>`s behind one async
//! mutex. Every operation runs entirely under the lock, which is what makes
//! `find_one_and_update` atomic here. No lock is held across an `.await`
//! other than the lock acquisition itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::domain::item::fields;
use crate::ports::{
    DocumentStore, FindOneAndUpdateOptions, IdGenerator, ReturnDocument, SystemClock,
    UlidGenerator,
};
use crate::query::sort::compare_documents;
use crate::query::{Document, Filter, Update};

pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    id_generator: Box<dyn IdGenerator>,
    /// Simulated outage: every operation fails with `StoreError::Unavailable`.
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_id_generator(UlidGenerator::new(Arc::new(SystemClock)))
    }

    pub fn with_id_generator(id_generator: impl IdGenerator + 'static) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            id_generator: Box::new(id_generator),
            offline: AtomicBool::new(false),
        }
    }

    /// Toggle the simulated outage.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply to a copy first so a failing update leaves the document untouched.
fn apply_update(doc: &mut Document, update: &Update) -> Result<(), StoreError> {
    let mut updated = doc.clone();
    update.apply(&mut updated)?;
    *doc = updated;
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        self.ensure_online()?;
        let id = self.id_generator.generate_item_id();
        doc.insert(fields::ID.to_string(), Value::String(id.as_ulid().to_string()));

        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<Document>, StoreError> {
        self.ensure_online()?;
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };

        // min_by keeps the first of equal candidates, i.e. insertion order.
        let winner = docs
            .iter()
            .enumerate()
            .filter(|(_, doc)| filter.matches(doc))
            .min_by(|(_, a), (_, b)| compare_documents(&options.sort, a, b))
            .map(|(index, _)| index);
        let Some(index) = winner else {
            return Ok(None);
        };

        let doc = &mut docs[index];
        let before = doc.clone();
        apply_update(doc, update)?;
        Ok(Some(match options.return_document {
            ReturnDocument::Before => before,
            ReturnDocument::After => doc.clone(),
        }))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter_mut().find(|doc| filter.matches(doc)) {
            Some(doc) => {
                apply_update(doc, update)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut updated = 0;
        for doc in docs.iter_mut().filter(|doc| filter.matches(doc)) {
            apply_update(doc, update)?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.ensure_online()?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortKey;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, rank) in [("a", 5), ("b", 1), ("c", 1)] {
            store
                .insert_one("items", doc(json!({"name": name, "rank": rank})))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let store = InMemoryStore::new();
        let a = store.insert_one("items", doc(json!({}))).await.unwrap();
        let b = store.insert_one("items", doc(json!({}))).await.unwrap();
        assert!(a["_id"].is_string());
        assert_ne!(a["_id"], b["_id"]);
    }

    #[tokio::test]
    async fn find_one_and_update_honours_sort_then_insertion_order() {
        let store = seeded().await;
        let options = FindOneAndUpdateOptions {
            sort: vec![SortKey::asc("rank")],
            return_document: ReturnDocument::After,
        };
        let update = Update::new().set("taken", true);
        let unclaimed = Filter::missing("taken");

        let first = store
            .find_one_and_update("items", &unclaimed, &update, options.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first["name"], "b");
        assert_eq!(first["taken"], true);

        let second = store
            .find_one_and_update("items", &unclaimed, &update, options.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second["name"], "c");

        let third = store
            .find_one_and_update("items", &unclaimed, &update, options.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(third["name"], "a");

        let none = store
            .find_one_and_update("items", &unclaimed, &update, options)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn return_before_gives_pre_update_document() {
        let store = seeded().await;
        let before = store
            .find_one_and_update(
                "items",
                &Filter::eq("name", "a"),
                &Update::new().set("rank", 9),
                FindOneAndUpdateOptions {
                    return_document: ReturnDocument::Before,
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before["rank"], 5);
        assert_eq!(store.count("items", &Filter::eq("rank", 9)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn one_and_many_variants_differ() {
        let store = seeded().await;
        let rank_one = Filter::eq("rank", 1);

        assert_eq!(store.update_one("items", &rank_one, &Update::new().set("x", 1)).await.unwrap(), 1);
        assert_eq!(store.update_many("items", &rank_one, &Update::new().set("y", 1)).await.unwrap(), 2);
        assert_eq!(store.delete_one("items", &rank_one).await.unwrap(), 1);
        assert_eq!(store.count("items", &rank_one).await.unwrap(), 1);
        assert_eq!(store.delete_many("items", &Filter::and([])).await.unwrap(), 2);
        assert!(store.find("items", &Filter::and([])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_update_leaves_document_untouched() {
        let store = seeded().await;
        let err = store
            .update_one(
                "items",
                &Filter::eq("name", "a"),
                &Update::new().set("rank", 7).push("name", "oops"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert_eq!(store.count("items", &Filter::eq("rank", 5)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_collection_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.count("nope", &Filter::and([])).await.unwrap(), 0);
        assert_eq!(store.delete_many("nope", &Filter::and([])).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn offline_store_fails_every_operation() {
        let store = seeded().await;
        store.set_offline(true);
        let err = store.count("items", &Filter::and([])).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_offline(false);
        assert_eq!(store.count("items", &Filter::and([])).await.unwrap(), 3);
    }
}
