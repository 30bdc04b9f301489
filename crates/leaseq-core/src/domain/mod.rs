//! Domain model (ids, items, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod item;
pub mod outcome;

pub use self::errors::{QueueError, StoreError};
pub use self::ids::{Id, IdMarker, ItemId};
pub use self::item::{EnqueueOptions, ItemType, NewItem, Priority, QueueItem, ReleaseRecord};
pub use self::outcome::Outcome;
