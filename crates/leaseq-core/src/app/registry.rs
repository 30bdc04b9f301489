//! WorkerRegistry - item type to worker mapping.
//!
//! One registry per queue. The registered type set doubles as the claim
//! filter, so a queue never leases items it has no worker for.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::ItemType;
use crate::ports::Worker;

#[derive(Default)]
pub struct WorkerRegistry {
    workers: RwLock<HashMap<ItemType, Arc<dyn Worker>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `worker` for `item_type`. The last registration wins; the
    /// replaced worker, if any, is returned.
    pub fn register(&self, item_type: ItemType, worker: Arc<dyn Worker>) -> Option<Arc<dyn Worker>> {
        self.workers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item_type, worker)
    }

    pub fn get(&self, item_type: &ItemType) -> Option<Arc<dyn Worker>> {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item_type)
            .cloned()
    }

    pub fn contains(&self, item_type: &ItemType) -> bool {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(item_type)
    }

    /// Registered types, sorted.
    pub fn registered_types(&self) -> Vec<ItemType> {
        let mut types: Vec<ItemType> = self
            .workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, QueueError, QueueItem};
    use async_trait::async_trait;

    struct Fixed(Outcome);

    #[async_trait]
    impl Worker for Fixed {
        async fn process(&self, _item: &mut QueueItem) -> Result<Outcome, QueueError> {
            Ok(self.0)
        }
    }

    #[test]
    fn register_and_get() {
        let registry = WorkerRegistry::new();
        assert!(registry.is_empty());

        let previous = registry.register(ItemType::new("email"), Arc::new(Fixed(Outcome::Completed)));
        assert!(previous.is_none());
        assert!(registry.contains(&ItemType::new("email")));
        assert!(registry.get(&ItemType::new("email")).is_some());
        assert!(registry.get(&ItemType::new("sms")).is_none());
    }

    #[test]
    fn last_registration_wins() {
        let registry = WorkerRegistry::new();
        registry.register(ItemType::new("email"), Arc::new(Fixed(Outcome::Completed)));
        let replaced = registry.register(ItemType::new("email"), Arc::new(Fixed(Outcome::Retry)));

        assert!(replaced.is_some());
        assert_eq!(registry.registered_types(), vec![ItemType::new("email")]);
    }

    #[tokio::test]
    async fn replaced_worker_is_the_one_used() {
        let registry = WorkerRegistry::new();
        registry.register(ItemType::new("email"), Arc::new(Fixed(Outcome::Completed)));
        registry.register(ItemType::new("email"), Arc::new(Fixed(Outcome::Rejected)));

        let worker = registry.get(&ItemType::new("email")).unwrap();
        let mut item: QueueItem = serde_json::from_value(serde_json::json!({
            "_id": ulid::Ulid::new().to_string(),
            "type": "email",
            "dateCreated": 0,
        }))
        .unwrap();
        assert_eq!(worker.process(&mut item).await.unwrap(), Outcome::Rejected);
    }

    #[test]
    fn registered_types_are_sorted() {
        let registry = WorkerRegistry::new();
        for t in ["sms", "email", "push"] {
            registry.register(ItemType::new(t), Arc::new(Fixed(Outcome::Completed)));
        }
        let types: Vec<String> = registry
            .registered_types()
            .into_iter()
            .map(|t| t.as_str().to_string())
            .collect();
        assert_eq!(types, vec!["email", "push", "sms"]);
    }
}
