//! Store — durable persistence of build candidate state.
//!
//! The parser only ever talks to a [`BuildStore`]. `json.rs` provides the
//! file-backed implementation, `memory.rs` a test double.

pub mod json;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::candidate::BuildCandidate;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serializing candidate failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Store rejected write: {0}")]
    Rejected(String),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable record store keyed by candidate name.
///
/// `save` stages the full candidate state; `commit` makes the staged state
/// durable all at once. A failed commit leaves the previously committed
/// state untouched and keeps the staged write for a later retry.
///
/// Object-safe thanks to boxed futures, so callers can hold
/// `Arc<dyn BuildStore>`.
pub trait BuildStore: Send + Sync {
    fn load<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<BuildCandidate>>;

    fn save<'a>(&'a self, candidate: &'a BuildCandidate) -> StoreFuture<'a, ()>;

    fn commit<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()>;
}

/// Stage and commit the full candidate state in one go.
pub async fn persist(store: &dyn BuildStore, candidate: &BuildCandidate) -> Result<(), StoreError> {
    store.save(candidate).await?;
    store.commit(&candidate.name).await
}
