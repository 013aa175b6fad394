//! The `tokens.json` repository. Minting (`id.secret` generation,
//! hashing) lives in `codex-agent-auth`; this crate only persists the
//! already-built `TokenRecord`.

use codex_agent_core::TokenRecord;

use crate::error::RepoError;
use crate::store::JsonStore;

pub struct TokenRepository {
    store: JsonStore<Vec<TokenRecord>>,
}

impl TokenRepository {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub async fn list(&self) -> Vec<TokenRecord> {
        self.store.load().await
    }

    pub async fn get(&self, id: &str) -> Option<TokenRecord> {
        self.list().await.into_iter().find(|t| t.id == id)
    }

    pub async fn insert(&self, token: TokenRecord) -> Result<TokenRecord, RepoError> {
        let mut tokens = self.list().await;
        tokens.push(token.clone());
        self.store.save(&tokens)?;
        Ok(token)
    }

    pub async fn revoke(&self, id: &str) -> Result<Option<TokenRecord>, RepoError> {
        let mut tokens = self.list().await;
        let Some(token) = tokens.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        token.revoked_at = Some(chrono::Utc::now());
        let updated = token.clone();
        self.store.save(&tokens)?;
        Ok(Some(updated))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        let mut tokens = self.list().await;
        let before = tokens.len();
        tokens.retain(|t| t.id != id);
        let removed = tokens.len() != before;
        if removed {
            self.store.save(&tokens)?;
        }
        Ok(removed)
    }
}
