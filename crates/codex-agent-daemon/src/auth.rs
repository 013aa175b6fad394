//! Bearer extraction and the 401/403 dispatch from §6/§7: missing bearer
//! when a static token is configured is 401; otherwise an absent bearer
//! means no auth is configured at all and the request is treated as
//! fully authorized, matching the "local-only by default" posture.

use axum::http::{header, HeaderMap};
use codex_agent_auth::AuthContext;

use crate::error::ApiError;
use crate::state::AppState;

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    match extract_bearer(headers) {
        Some(bearer) => state.auth.authenticate(&bearer).await.map_err(ApiError::from),
        None if state.static_token.is_some() => Err(ApiError::Unauthorized),
        None => Ok(AuthContext::Static),
    }
}

pub fn require_permission(ctx: &AuthContext, permission: &str) -> Result<(), ApiError> {
    if ctx.is_authorized(permission) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(permission.to_string()))
    }
}

/// Authenticates the request then checks it carries `permission`, the
/// combination every non-health route performs.
pub async fn authorize(state: &AppState, headers: &HeaderMap, permission: &str) -> Result<AuthContext, ApiError> {
    let ctx = authenticate(state, headers).await?;
    require_permission(&ctx, permission)?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DaemonConfig;
    use codex_agent_core::DaemonMode;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path, static_token: Option<String>) -> DaemonConfig {
        DaemonConfig {
            config_dir: dir.to_path_buf(),
            home: dir.to_path_buf(),
            host: "127.0.0.1".to_string(),
            port: 0,
            static_token,
            binary: "codex".to_string(),
            mode: DaemonMode::Http,
        }
    }

    #[tokio::test]
    async fn missing_bearer_with_no_static_token_is_fully_authorized() {
        let dir = tempdir().unwrap();
        let state = AppState::new(config(dir.path(), None));
        let ctx = authenticate(&state, &HeaderMap::new()).await.unwrap();
        assert!(ctx.is_authorized("group:run"));
    }

    #[tokio::test]
    async fn missing_bearer_with_static_token_is_unauthorized() {
        let dir = tempdir().unwrap();
        let state = AppState::new(config(dir.path(), Some("secret".to_string())));
        assert!(matches!(
            authenticate(&state, &HeaderMap::new()).await,
            Err(ApiError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn matching_static_bearer_is_authorized() {
        let dir = tempdir().unwrap();
        let state = AppState::new(config(dir.path(), Some("secret".to_string())));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        let ctx = authenticate(&state, &headers).await.unwrap();
        assert!(ctx.is_authorized("anything:at-all"));
    }

    #[tokio::test]
    async fn require_permission_rejects_insufficient_managed_context() {
        let ctx = AuthContext::Managed {
            token_id: "t1".to_string(),
            permissions: vec![codex_agent_core::Permission::new("session:read")],
        };
        assert!(require_permission(&ctx, "session:read").is_ok());
        assert!(matches!(require_permission(&ctx, "group:run"), Err(ApiError::Forbidden(_))));
    }
}
