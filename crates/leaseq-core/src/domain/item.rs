//! Queue item: the persisted unit of work and its release audit trail.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::QueueError;
use super::ids::ItemId;

/// Document field names, shared by the repository's filters and updates.
pub mod fields {
    pub const ID: &str = "_id";
    pub const TYPE: &str = "type";
    pub const MESSAGE: &str = "message";
    pub const PRIORITY: &str = "priority";
    pub const DATE_CREATED: &str = "dateCreated";
    pub const RECEIVED_TIME: &str = "receivedTime";
    pub const NEXT_RECEIVABLE_TIME: &str = "nextReceivableTime";
    pub const RETRY_COUNT: &str = "retryCount";
    pub const REJECTED_TIME: &str = "rejectedTime";
    pub const REJECTION_REASON: &str = "rejectionReason";
    pub const RELEASE_HISTORY: &str = "releaseHistory";
}

/// Routing key of an item: selects the worker that processes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemType(String);

impl ItemType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ItemType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Claim priority, 1 (highest) to 10 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(10);

    pub fn new(value: u8) -> Result<Self, QueueError> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(QueueError::InvalidPriority(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::HIGHEST
    }
}

impl TryFrom<u8> for Priority {
    type Error = QueueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// One release or reject event, appended to `QueueItem::release_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    /// Retry count *before* the event (absent on the item counts as 0).
    pub retry_count: u32,

    /// When the released lease was taken.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub received_time: Option<DateTime<Utc>>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub released_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_reason: Option<String>,
}

/// A persisted queue item.
///
/// Timestamps are stored as epoch milliseconds so the store can compare
/// them numerically. Absent optionals are omitted from the document.
///
/// Workers receive `&mut QueueItem` and may set `released_reason`,
/// `next_receivable_time` (before `Retry`) or `rejection_reason`
/// (before `Rejected`); the dispatcher reads them when routing the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    #[serde(rename = "_id")]
    pub id: ItemId,

    #[serde(rename = "type")]
    pub item_type: ItemType,

    #[serde(default)]
    pub message: serde_json::Value,

    #[serde(default)]
    pub priority: Priority,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_created: DateTime<Utc>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub received_time: Option<DateTime<Utc>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub next_receivable_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub rejected_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// Transient: only copied into the next `ReleaseRecord`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_reason: Option<String>,

    #[serde(default)]
    pub release_history: Vec<ReleaseRecord>,
}

impl QueueItem {
    /// Prior release cycles; absent counts as 0.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.unwrap_or(0)
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected_time.is_some()
    }

    /// In-process mirror of the claim filter (minus the type restriction).
    pub fn is_available(&self, now: DateTime<Utc>, processing_timeout: Duration) -> bool {
        if self.rejected_time.is_some() {
            return false;
        }
        if self.next_receivable_time.is_some_and(|t| t > now) {
            return false;
        }
        match self.received_time {
            Some(received) => received + processing_timeout <= now,
            None => true,
        }
    }

    /// Ask for a retry no earlier than `at`, recording why.
    pub fn retry_at(&mut self, at: DateTime<Utc>, reason: impl Into<String>) {
        self.next_receivable_time = Some(at);
        self.released_reason = Some(reason.into());
    }

    /// Record why the item is being rejected.
    pub fn reject_because(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.released_reason = Some(reason.clone());
        self.rejection_reason = Some(reason);
    }

    /// Decode the payload into a concrete message type.
    pub fn decode<M: serde::de::DeserializeOwned>(&self) -> Result<M, QueueError> {
        Ok(serde_json::from_value(self.message.clone())?)
    }
}

/// Options accepted by `enqueue`.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub next_receivable_time: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
}

impl EnqueueOptions {
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.next_receivable_time = Some(at);
        self
    }
}

/// An item not yet persisted.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub item_type: ItemType,
    pub message: serde_json::Value,
    pub priority: Priority,
    pub next_receivable_time: Option<DateTime<Utc>>,
    /// Set when the item is inserted already claimed (`enqueue_and_process`).
    pub received_time: Option<DateTime<Utc>>,
}

impl NewItem {
    pub fn new(item_type: impl Into<ItemType>, message: serde_json::Value) -> Self {
        Self {
            item_type: item_type.into(),
            message,
            priority: Priority::default(),
            next_receivable_time: None,
            received_time: None,
        }
    }

    pub fn with_options(mut self, options: EnqueueOptions) -> Self {
        if let Some(priority) = options.priority {
            self.priority = priority;
        }
        self.next_receivable_time = options.next_receivable_time;
        self
    }
}
