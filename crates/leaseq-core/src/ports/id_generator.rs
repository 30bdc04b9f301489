//! IdGenerator port - where item ids come from.
//!
//! Stores assign item ids on insert; the in-memory store asks this port for
//! them. Ids are ULIDs whose timestamp part comes from the injected `Clock`,
//! so a `FixedClock` yields ids with a deterministic time prefix.

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ItemId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_item_id(&self) -> ItemId;
}

/// ULID generator: clock timestamp + random tail.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_item_id(&self) -> ItemId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        ItemId::from(ulid)
    }
}
