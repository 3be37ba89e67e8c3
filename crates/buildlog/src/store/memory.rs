//! Memory — test double for the durable store.
//!
//! Keeps staged and committed candidates in memory and records every commit,
//! so tests can assert on flush frequency and on what each flush contained.
//! Commits can be made to fail to exercise the error paths.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::{BuildStore, StoreError, StoreFuture};
use crate::candidate::BuildCandidate;

#[derive(Default)]
struct Inner {
    staged: HashMap<String, BuildCandidate>,
    committed: HashMap<String, BuildCandidate>,
    history: Vec<BuildCandidate>,
    fail_commits: bool,
}

/// An in-memory store for deterministic testing.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a committed candidate.
    pub async fn insert(&self, candidate: BuildCandidate) {
        let mut state = self.inner.lock().await;
        state.committed.insert(candidate.name.clone(), candidate);
    }

    /// Make every following commit fail (or succeed again).
    pub async fn set_fail_commits(&self, fail: bool) {
        self.inner.lock().await.fail_commits = fail;
    }

    pub async fn committed(&self, name: &str) -> Option<BuildCandidate> {
        self.inner.lock().await.committed.get(name).cloned()
    }

    /// Every successfully committed state, oldest first.
    pub async fn history(&self) -> Vec<BuildCandidate> {
        self.inner.lock().await.history.clone()
    }

    pub async fn commit_count(&self) -> usize {
        self.inner.lock().await.history.len()
    }
}

impl BuildStore for MemoryStore {
    fn load<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<BuildCandidate>> {
        Box::pin(async move { Ok(self.inner.lock().await.committed.get(name).cloned()) })
    }

    fn save<'a>(&'a self, candidate: &'a BuildCandidate) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.staged.insert(candidate.name.clone(), candidate.clone());
            Ok(())
        })
    }

    fn commit<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if state.fail_commits {
                return Err(StoreError::Rejected(format!("commit of {name} refused")));
            }
            let Some(candidate) = state.staged.remove(name) else {
                return Ok(());
            };
            state.history.push(candidate.clone());
            state.committed.insert(name.to_string(), candidate);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_is_invisible_until_commit() {
        let store = MemoryStore::new();
        let candidate = BuildCandidate::new("dc-1", Vec::new());

        store.save(&candidate).await.unwrap();
        assert_eq!(store.load("dc-1").await.unwrap(), None);

        store.commit("dc-1").await.unwrap();
        assert_eq!(store.load("dc-1").await.unwrap(), Some(candidate));
        assert_eq!(store.commit_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_staged_state() {
        let store = MemoryStore::new();
        let mut candidate = BuildCandidate::new("dc-1", Vec::new());
        candidate.build_output = "#1 DONE 0.1s\n".to_string();

        store.set_fail_commits(true).await;
        store.save(&candidate).await.unwrap();
        assert!(matches!(store.commit("dc-1").await, Err(StoreError::Rejected(_))));
        assert_eq!(store.committed("dc-1").await, None);

        store.set_fail_commits(false).await;
        store.commit("dc-1").await.unwrap();
        assert_eq!(store.committed("dc-1").await, Some(candidate));
    }
}
