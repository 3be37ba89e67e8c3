//! JSON — file-backed store, one `<name>.json` document per candidate.
//!
//! `commit` writes a sibling temp file and renames it over the document, so
//! readers see either the previous or the new state, never a partial one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::{BuildStore, StoreError, StoreFuture};
use crate::candidate::BuildCandidate;

pub struct JsonFileStore {
    dir: PathBuf,
    /// Serialized candidates waiting for `commit`
    staged: Mutex<HashMap<String, Vec<u8>>>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staged: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::Rejected(format!("invalid candidate name: {name:?}")));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl BuildStore for JsonFileStore {
    fn load<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<BuildCandidate>> {
        Box::pin(async move {
            let path = self.path_for(name)?;
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            Ok(Some(serde_json::from_slice(&bytes)?))
        })
    }

    fn save<'a>(&'a self, candidate: &'a BuildCandidate) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.path_for(&candidate.name)?;
            let bytes = serde_json::to_vec_pretty(candidate)?;
            self.staged.lock().await.insert(candidate.name.clone(), bytes);
            Ok(())
        })
    }

    fn commit<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(name)?;
            let mut staged = self.staged.lock().await;
            let Some(bytes) = staged.get(name) else {
                return Ok(());
            };

            tokio::fs::create_dir_all(&self.dir).await?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;

            staged.remove(name);
            tracing::trace!(path = %path.display(), "committed candidate");
            Ok(())
        })
    }
}
