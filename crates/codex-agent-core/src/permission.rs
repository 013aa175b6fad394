//! The permission vocabulary and wildcard-matching rule from §3/§6.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission(String);

impl Permission {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn domain(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with(":*")
    }

    /// Whether `self` (as held by a token) grants `required`: exact match,
    /// or `<domain>:*` granting any `<domain>:<op>`.
    pub fn grants(&self, required: &Permission) -> bool {
        if self.0 == required.0 {
            return true;
        }
        if self.is_wildcard() && self.domain() == required.domain() {
            return true;
        }
        false
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

pub const SESSION_CREATE: &str = "session:create";
pub const SESSION_READ: &str = "session:read";
pub const SESSION_CANCEL: &str = "session:cancel";
pub const GROUP_WILDCARD: &str = "group:*";
pub const QUEUE_WILDCARD: &str = "queue:*";
pub const BOOKMARK_WILDCARD: &str = "bookmark:*";

/// Does `held` (any of a token's granted permissions) satisfy `required`?
pub fn permissions_grant(held: &[Permission], required: &str) -> bool {
    let required = Permission::new(required);
    held.iter().any(|p| p.grants(&required))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_grants() {
        let held = vec![Permission::new(SESSION_READ)];
        assert!(permissions_grant(&held, SESSION_READ));
        assert!(!permissions_grant(&held, "session:create"));
    }

    #[test]
    fn wildcard_grants_domain() {
        let held = vec![Permission::new(GROUP_WILDCARD)];
        assert!(permissions_grant(&held, "group:run"));
        assert!(permissions_grant(&held, "group:pause"));
        assert!(!permissions_grant(&held, "queue:run"));
    }
}
