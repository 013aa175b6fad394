//! The `bookmarks.json` repository, enforcing the cross-contamination
//! validation rules from §3 before persisting.

use codex_agent_core::{Bookmark, BookmarkValidationError};

use crate::error::RepoError;
use crate::store::JsonStore;

pub struct BookmarkRepository {
    store: JsonStore<Vec<Bookmark>>,
}

impl BookmarkRepository {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub async fn list(&self) -> Vec<Bookmark> {
        self.store.load().await
    }

    pub async fn get(&self, id: &str) -> Option<Bookmark> {
        self.list().await.into_iter().find(|b| b.id == id)
    }

    pub async fn create(&self, bookmark: Bookmark) -> Result<Bookmark, RepoError> {
        bookmark
            .validate()
            .map_err(|e: BookmarkValidationError| RepoError::Validation(e.to_string()))?;
        let mut bookmarks = self.list().await;
        bookmarks.push(bookmark.clone());
        self.store.save(&bookmarks)?;
        Ok(bookmark)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        let mut bookmarks = self.list().await;
        let before = bookmarks.len();
        bookmarks.retain(|b| b.id != id);
        let removed = bookmarks.len() != before;
        if removed {
            self.store.save(&bookmarks)?;
        }
        Ok(removed)
    }
}
