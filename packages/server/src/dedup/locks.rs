use std::sync::Arc;

use dashmap::DashMap;
use filehub_common::storage::Fingerprint;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-fingerprint mutual exclusion.
///
/// Requests on the same fingerprint queue behind each other; requests on
/// different fingerprints never contend. Entries are dropped once nobody
/// holds or waits on them.
#[derive(Default)]
pub struct FingerprintLocks {
    locks: DashMap<Fingerprint, Arc<Mutex<()>>>,
}

/// Held for the duration of a critical section. Released on drop, including
/// when the owning future is cancelled.
pub struct FingerprintGuard<'a> {
    locks: &'a FingerprintLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl FingerprintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, fingerprint: Fingerprint) -> FingerprintGuard<'_> {
        // Built before waiting so that a cancelled waiter still sweeps its entry.
        let mut held = FingerprintGuard {
            locks: self,
            guard: None,
        };
        let mutex = self.locks.entry(fingerprint).or_default().clone();
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Fingerprints currently locked or waited on.
    pub fn active(&self) -> usize {
        self.locks.len()
    }

    /// Drop every entry nobody holds or waits on.
    fn sweep(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }
}

impl Drop for FingerprintGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.sweep();
    }
}
