//! Ties the bearer-auth decision from §6 together: static-token exact
//! match first, else managed-token lookup against the token repository.

use chrono::Utc;
use codex_agent_repo::TokenRepository;

use crate::constant_time::constant_time_eq;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::token::{parse_wire_token, verify};

pub struct AuthManager {
    tokens: TokenRepository,
    static_token: Option<String>,
}

impl AuthManager {
    pub fn new(tokens: TokenRepository, static_token: Option<String>) -> Self {
        Self { tokens, static_token }
    }

    /// The underlying token repository, for the daemon's token CRUD routes.
    pub fn tokens(&self) -> &TokenRepository {
        &self.tokens
    }

    /// Authenticates one `Authorization: Bearer <token>` value. If
    /// `config.token` is set, only an exact match is accepted. Otherwise
    /// the bearer is parsed as `<id>.<secret>` and checked against the
    /// token repository.
    pub async fn authenticate(&self, bearer: &str) -> Result<AuthContext, AuthError> {
        if let Some(expected) = &self.static_token {
            return if constant_time_eq(bearer, expected) {
                Ok(AuthContext::Static)
            } else {
                Err(AuthError::Malformed)
            };
        }

        let (id, secret) = parse_wire_token(bearer)?;
        let record = self.tokens.get(id).await.ok_or(AuthError::NotFound)?;
        verify(&record, secret, Utc::now())?;

        Ok(AuthContext::Managed {
            token_id: record.id,
            permissions: record.permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_agent_core::Permission;
    use tempfile::tempdir;

    #[tokio::test]
    async fn static_token_exact_match_is_authorized_for_everything() {
        let dir = tempdir().unwrap();
        let tokens = TokenRepository::new(dir.path().join("tokens.json"));
        let manager = AuthManager::new(tokens, Some("shared-secret".to_string()));

        let ctx = manager.authenticate("shared-secret").await.unwrap();
        assert!(ctx.is_authorized("group:run"));
    }

    #[tokio::test]
    async fn static_token_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let tokens = TokenRepository::new(dir.path().join("tokens.json"));
        let manager = AuthManager::new(tokens, Some("shared-secret".to_string()));

        assert!(manager.authenticate("wrong").await.is_err());
    }

    #[tokio::test]
    async fn managed_token_carries_its_permission_set() {
        let dir = tempdir().unwrap();
        let tokens = TokenRepository::new(dir.path().join("tokens.json"));
        let minted = crate::token::mint(
            "ci".to_string(),
            vec![Permission::new("session:read")],
            None,
        );
        tokens.insert(minted.record.clone()).await.unwrap();
        let manager = AuthManager::new(tokens, None);

        let ctx = manager.authenticate(&minted.wire_token).await.unwrap();
        assert!(ctx.is_authorized("session:read"));
        assert!(!ctx.is_authorized("group:run"));
    }

    #[tokio::test]
    async fn unknown_token_id_is_rejected() {
        let dir = tempdir().unwrap();
        let tokens = TokenRepository::new(dir.path().join("tokens.json"));
        let manager = AuthManager::new(tokens, None);

        assert!(manager.authenticate("missing-id.somesecret").await.is_err());
    }
}
