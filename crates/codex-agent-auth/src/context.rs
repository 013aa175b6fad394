//! The request auth context (§9: "the auth context is either `static`
//! (full permissions) or `managed` (carried permission set) — a closed
//! sum").

use codex_agent_core::Permission;

/// The outcome of authenticating one incoming request.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// `config.token` matched exactly: every route is authorized.
    Static,
    /// A managed token was verified: only its carried permissions are
    /// authorized.
    Managed { token_id: String, permissions: Vec<Permission> },
}

impl AuthContext {
    pub fn is_authorized(&self, required: &str) -> bool {
        match self {
            AuthContext::Static => true,
            AuthContext::Managed { permissions, .. } => {
                codex_agent_core::permission::permissions_grant(permissions, required)
            }
        }
    }
}
