//! Domain identifiers (strongly-typed IDs).
//!
//! IDs are ULIDs wrapped in a phantom-typed `Id<T>`: one generic
//! implementation, while each marker type keeps IDs from being mixed up.
//! ULIDs sort by creation time and can be generated on any node without
//! coordination, which is what a store-assigned document id needs.
//!
//! On the wire an `Id<T>` is the bare ULID string (no prefix), so stores can
//! index and compare it as a plain value. `Display` adds the marker prefix for
//! logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait supplying the display prefix of an ID type.
pub trait IdMarker: Send + Sync + 'static {
    /// Prefix used by `Display` (e.g. "item-").
    fn prefix() -> &'static str;
}

/// Generic ID type.
///
/// `T` only exists at compile time; `Id<T>` is exactly as large as a `Ulid`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Parses either the bare ULID or the prefixed display form.
impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

// ========================================
// Marker types
// ========================================

/// Marker for queue items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {}

impl IdMarker for Item {
    fn prefix() -> &'static str {
        "item-"
    }
}

/// Identifier of a persisted queue item. Assigned by the store on insert.
pub type ItemId = Id<Item>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix() {
        let ulid = Ulid::new();
        let id = ItemId::from_ulid(ulid);
        assert_eq!(id.to_string(), format!("item-{ulid}"));
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id = ItemId::from_ulid(ulid);

        let value = serde_json::to_value(id).unwrap();
        assert_eq!(value, serde_json::Value::String(ulid.to_string()));

        let back: ItemId = serde_json::from_value(value).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parses_prefixed_and_bare_forms() {
        let id = ItemId::from_ulid(Ulid::new());
        assert_eq!(id.to_string().parse::<ItemId>().unwrap(), id);
        assert_eq!(id.as_ulid().to_string().parse::<ItemId>().unwrap(), id);
        assert!("item-not-a-ulid".parse::<ItemId>().is_err());
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let id1 = ItemId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = ItemId::from_ulid(Ulid::new());
        assert!(id1 < id2);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<ItemId>(), size_of::<Ulid>());
    }
}
