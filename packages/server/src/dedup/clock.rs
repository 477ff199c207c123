use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of `created_at` timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of record identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Time-ordered UUIDv7 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7;

impl IdGenerator for UuidV7 {
    fn next_id(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Assigns identity and creation time to new records and blobs.
#[derive(Clone)]
pub struct RecordStamper {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl RecordStamper {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn stamp(&self) -> (Uuid, DateTime<Utc>) {
        (self.ids.next_id(), self.clock.now())
    }
}

impl Default for RecordStamper {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(UuidV7))
    }
}
