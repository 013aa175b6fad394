//! The generic load-swallow-to-empty, atomic-read-modify-write-rename
//! shape every domain repository in this crate is built on (§4.7/§7:
//! "every repository read swallows parse/IO errors into empty; every
//! repository write is atomic"). A missing file loads as the default
//! value, not an error.

use std::path::{Path, PathBuf};

use codex_agent_core::atomic_write_json_pretty;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::RepoError;

/// A JSON document stored at `path`, loaded into `T` with a
/// missing-file-or-malformed-file fallback to `T::default()`.
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T> JsonStore<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document. A missing file or any parse/IO failure yields
    /// `T::default()` rather than propagating, per the swallow-to-empty
    /// recovery policy.
    pub async fn load(&self) -> T {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), %err, "repository file is not valid JSON, treating as empty");
                T::default()
            }),
            Err(_) => T::default(),
        }
    }

    /// Atomically persists `value` as a pretty-printed JSON document with
    /// a trailing newline.
    pub fn save(&self, value: &T) -> Result<(), RepoError> {
        atomic_write_json_pretty(&self.path, value).map_err(RepoError::Io)
    }
}
