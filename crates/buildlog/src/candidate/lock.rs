use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-candidate parse serialization.
///
/// Parses of different candidates run concurrently; parses of the same
/// candidate queue behind one another so only one writer touches its
/// persisted state at a time. An entry lives only while some parse holds or
/// waits on it.
#[derive(Debug, Default)]
pub struct CandidateLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one candidate. Releasing it removes the candidate's
/// entry unless another parse is already waiting.
#[derive(Debug)]
pub struct CandidateGuard<'a> {
    locks: &'a CandidateLocks,
    candidate: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl CandidateLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `candidate`.
    pub async fn acquire(&self, candidate: &str) -> CandidateGuard<'_> {
        // Clone the Arc out so the DashMap shard lock is not held across the await
        let lock = Arc::clone(
            self.locks
                .entry(candidate.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        CandidateGuard {
            locks: self,
            candidate: candidate.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of candidates currently locked or waited on.
    pub fn held(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for CandidateGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map's own reference is the last one unless a waiter holds a clone
        self.locks
            .locks
            .remove_if(&self.candidate, |_, lock| Arc::strong_count(lock) == 1);
        tracing::trace!(
            candidate = %self.candidate,
            held = self.locks.held(),
            "released candidate lock"
        );
    }
}
