//! ItemRepository - queue operations expressed as document store calls.
//!
//! Every state transition of an item is one store call:
//!
//! - claim: one atomic `find_one_and_update` over the availability predicate
//! - complete: `delete_one` by id
//! - release / reject: `update_one` by id (set + unset + push history)
//!
//! The repository never locks anything itself; mutual exclusion between
//! claimers (in this process or others) comes from the store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::domain::item::fields;
use crate::domain::{ItemId, ItemType, NewItem, Priority, QueueError, QueueItem, ReleaseRecord};
use crate::ports::{Clock, DocumentStore, FindOneAndUpdateOptions, ReturnDocument};
use crate::query::{Document, Filter, SortKey, Update, path};

/// Options for `update_one` / `update_many`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Also move the item's `nextReceivableTime`.
    pub next_receivable_time: Option<DateTime<Utc>>,
}

/// Shape of a freshly inserted document. `_id` is added by the store.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertDocument<'a> {
    #[serde(rename = "type")]
    item_type: &'a ItemType,
    message: &'a Value,
    priority: Priority,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    date_created: DateTime<Utc>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    received_time: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    next_receivable_time: Option<DateTime<Utc>>,
    release_history: [ReleaseRecord; 0],
}

#[derive(Clone)]
pub struct ItemRepository {
    store: Option<Arc<dyn DocumentStore>>,
    collection: String,
    clock: Arc<dyn Clock>,
    processing_timeout: Duration,
}

fn millis(t: DateTime<Utc>) -> Value {
    Value::from(t.timestamp_millis())
}

fn id_filter(id: ItemId) -> Filter {
    Filter::eq(fields::ID, id.as_ulid().to_string())
}

fn into_document(value: Value) -> Result<Document, QueueError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(QueueError::InvalidMessageFilter(other.to_string())),
    }
}

fn from_document(doc: Document) -> Result<QueueItem, QueueError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

impl ItemRepository {
    pub fn new(
        store: Option<Arc<dyn DocumentStore>>,
        collection: impl Into<String>,
        clock: Arc<dyn Clock>,
        processing_timeout: Duration,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            clock,
            processing_timeout,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn processing_timeout(&self) -> Duration {
        self.processing_timeout
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn store(&self) -> Result<&dyn DocumentStore, QueueError> {
        self.store.as_deref().ok_or(QueueError::StoreUnavailable)
    }

    /// Persist a new item; `dateCreated` is set here, the id by the store.
    pub async fn insert(&self, item: NewItem) -> Result<QueueItem, QueueError> {
        let store = self.store()?;
        let doc = into_document(serde_json::to_value(InsertDocument {
            item_type: &item.item_type,
            message: &item.message,
            priority: item.priority,
            date_created: self.clock.now(),
            received_time: item.received_time,
            next_receivable_time: item.next_receivable_time,
            release_history: [],
        })?)?;

        let stored = from_document(store.insert_one(&self.collection, doc).await?)?;
        debug!(item.id = %stored.id, item.type = %stored.item_type, "inserted item");
        Ok(stored)
    }

    /// Filter matching items a claimer may take right now.
    fn available_filter(&self, types: &[ItemType], now: DateTime<Utc>) -> Filter {
        let lease_cutoff = now
            .checked_sub_signed(self.processing_timeout)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Filter::and([
            Filter::is_in(fields::TYPE, types.iter().map(|t| t.as_str())),
            Filter::missing(fields::REJECTED_TIME),
            Filter::or([
                Filter::missing(fields::NEXT_RECEIVABLE_TIME),
                Filter::lte(fields::NEXT_RECEIVABLE_TIME, millis(now)),
            ]),
            // expired leases are claimable again
            Filter::or([
                Filter::missing(fields::RECEIVED_TIME),
                Filter::lte(fields::RECEIVED_TIME, millis(lease_cutoff)),
            ]),
        ])
    }

    /// Atomically lease one available item of the given types.
    ///
    /// Candidates are ordered by priority (1 first), then by creation time.
    /// Returns the document as it is after `receivedTime` was set. A stale
    /// `nextReceivableTime` is cleared; the item is already due.
    pub async fn claim(&self, types: &[ItemType]) -> Result<Option<QueueItem>, QueueError> {
        let store = self.store()?;
        if types.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        let filter = self.available_filter(types, now);
        // any nextReceivableTime seen at release time was then set by the worker
        let update = Update::new()
            .set(fields::RECEIVED_TIME, millis(now))
            .unset(fields::NEXT_RECEIVABLE_TIME);
        let options = FindOneAndUpdateOptions {
            sort: vec![SortKey::asc(fields::PRIORITY), SortKey::asc(fields::DATE_CREATED)],
            return_document: ReturnDocument::After,
        };

        let claimed = store
            .find_one_and_update(&self.collection, &filter, &update, options)
            .await?;
        match claimed {
            Some(doc) => {
                let item = from_document(doc)?;
                trace!(item.id = %item.id, item.type = %item.item_type, "claimed item");
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Delete a finished item. Returns how many were removed (0 or 1).
    pub async fn complete(&self, id: ItemId) -> Result<u64, QueueError> {
        let store = self.store()?;
        Ok(store.delete_one(&self.collection, &id_filter(id)).await?)
    }

    /// History entry for a release or reject happening now.
    fn release_record(&self, item: &QueueItem, now: DateTime<Utc>) -> Result<Value, QueueError> {
        Ok(serde_json::to_value(ReleaseRecord {
            retry_count: item.retry_count(),
            received_time: item.received_time,
            released_time: now,
            released_reason: item.released_reason.clone(),
        })?)
    }

    /// Return a leased item to the pool after a transient failure.
    ///
    /// `retryCount` goes up by one, `nextReceivableTime` is the worker's
    /// choice or now, and a history record captures the lease being released.
    pub async fn release(&self, item: &QueueItem) -> Result<u64, QueueError> {
        let store = self.store()?;
        let now = self.clock.now();
        let next = item.next_receivable_time.unwrap_or(now);

        let update = Update::new()
            .set(fields::RETRY_COUNT, item.retry_count() + 1)
            .set(fields::NEXT_RECEIVABLE_TIME, millis(next))
            .unset(fields::RECEIVED_TIME)
            .push(fields::RELEASE_HISTORY, self.release_record(item, now)?);

        let updated = store
            .update_one(&self.collection, &id_filter(item.id), &update)
            .await?;
        debug!(
            item.id = %item.id,
            retry_count = item.retry_count() + 1,
            reason = item.released_reason.as_deref().unwrap_or(""),
            "released item"
        );
        Ok(updated)
    }

    /// Permanently take an item out of rotation, keeping its record.
    pub async fn reject(&self, item: &QueueItem) -> Result<u64, QueueError> {
        let store = self.store()?;
        let now = self.clock.now();

        let update = Update::new()
            .set(fields::REJECTED_TIME, millis(now))
            .set_some(fields::REJECTION_REASON, item.rejection_reason.clone())
            .unset(fields::RECEIVED_TIME)
            .unset(fields::NEXT_RECEIVABLE_TIME)
            .push(fields::RELEASE_HISTORY, self.release_record(item, now)?);

        let updated = store
            .update_one(&self.collection, &id_filter(item.id), &update)
            .await?;
        debug!(
            item.id = %item.id,
            reason = item.rejection_reason.as_deref().unwrap_or(""),
            "rejected item"
        );
        Ok(updated)
    }

    /// `type == item_type` plus one equality per flattened `message.*` leaf.
    fn message_filter(item_type: &ItemType, message_filter: &Value) -> Result<Filter, QueueError> {
        let Value::Object(object) = message_filter else {
            return Err(QueueError::InvalidMessageFilter(message_filter.to_string()));
        };
        let mut filters = vec![Filter::eq(fields::TYPE, item_type.as_str())];
        filters.extend(
            path::flatten(fields::MESSAGE, object)
                .into_iter()
                .map(|(p, v)| Filter::Eq(p, v)),
        );
        Ok(Filter::And(filters))
    }

    fn message_update(message_update: &Value, options: &UpdateOptions) -> Result<Update, QueueError> {
        let Value::Object(object) = message_update else {
            return Err(QueueError::InvalidMessageFilter(message_update.to_string()));
        };
        let update = path::flatten(fields::MESSAGE, object)
            .into_iter()
            .fold(Update::new(), |update, (p, v)| update.set(p, v));
        Ok(update.set_some(fields::NEXT_RECEIVABLE_TIME, options.next_receivable_time.map(millis)))
    }

    /// Delete the first item of `item_type` whose message matches.
    pub async fn remove_one(&self, item_type: &ItemType, message_filter: &Value) -> Result<u64, QueueError> {
        let store = self.store()?;
        let filter = Self::message_filter(item_type, message_filter)?;
        Ok(store.delete_one(&self.collection, &filter).await?)
    }

    /// Delete every item of `item_type` whose message matches.
    pub async fn remove_many(&self, item_type: &ItemType, message_filter: &Value) -> Result<u64, QueueError> {
        let store = self.store()?;
        let filter = Self::message_filter(item_type, message_filter)?;
        Ok(store.delete_many(&self.collection, &filter).await?)
    }

    /// Patch the message (and optionally the deferral) of the first match.
    pub async fn update_one(
        &self,
        item_type: &ItemType,
        message_filter: &Value,
        message_update: &Value,
        options: UpdateOptions,
    ) -> Result<u64, QueueError> {
        let store = self.store()?;
        let filter = Self::message_filter(item_type, message_filter)?;
        let update = Self::message_update(message_update, &options)?;
        if update.is_empty() {
            return Ok(0);
        }
        Ok(store.update_one(&self.collection, &filter, &update).await?)
    }

    /// Patch the message (and optionally the deferral) of every match.
    pub async fn update_many(
        &self,
        item_type: &ItemType,
        message_filter: &Value,
        message_update: &Value,
        options: UpdateOptions,
    ) -> Result<u64, QueueError> {
        let store = self.store()?;
        let filter = Self::message_filter(item_type, message_filter)?;
        let update = Self::message_update(message_update, &options)?;
        if update.is_empty() {
            return Ok(0);
        }
        Ok(store.update_many(&self.collection, &filter, &update).await?)
    }

    pub async fn get(&self, id: ItemId) -> Result<Option<QueueItem>, QueueError> {
        let store = self.store()?;
        let mut docs = store.find(&self.collection, &id_filter(id)).await?;
        docs.pop().map(from_document).transpose()
    }

    /// Every stored item of a type, in any state.
    pub async fn find(&self, item_type: &ItemType) -> Result<Vec<QueueItem>, QueueError> {
        let store = self.store()?;
        store
            .find(&self.collection, &Filter::eq(fields::TYPE, item_type.as_str()))
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn count(&self, item_type: &ItemType) -> Result<u64, QueueError> {
        let store = self.store()?;
        Ok(store
            .count(&self.collection, &Filter::eq(fields::TYPE, item_type.as_str()))
            .await?)
    }
}
