//! Opaque `<id>.<secret>` token minting and verification (§3, §6).
//!
//! The wire token is `"<id>.<secret>"` where `secret` is 24 random bytes
//! hex-encoded; only `sha256(secret)` is ever persisted, never the raw
//! secret.

use chrono::{DateTime, Utc};
use codex_agent_core::{Permission, TokenRecord};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constant_time::constant_time_eq;
use crate::error::AuthError;

/// The minted token: the record to persist, plus the raw `id.secret`
/// wire value that is shown to the caller exactly once and never stored.
pub struct MintedToken {
    pub record: TokenRecord,
    pub wire_token: String,
}

fn random_secret_hex() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mints a new token: generates the id and secret, hashes the secret,
/// and returns both the storable record and the one-time wire value.
pub fn mint(name: String, permissions: Vec<Permission>, expires_at: Option<DateTime<Utc>>) -> MintedToken {
    let id = Uuid::new_v4().to_string();
    let secret = random_secret_hex();
    let token_hash = hash_secret(&secret);
    let record = TokenRecord {
        id: id.clone(),
        name,
        permissions,
        created_at: Utc::now(),
        expires_at,
        revoked_at: None,
        token_hash,
    };
    MintedToken {
        record,
        wire_token: format!("{id}.{secret}"),
    }
}

/// Splits a `<id>.<secret>` bearer value into its two parts.
pub fn parse_wire_token(token: &str) -> Result<(&str, &str), AuthError> {
    token.split_once('.').ok_or(AuthError::Malformed)
}

/// Verifies `secret` against `record`'s stored hash in constant time,
/// and that the record is neither revoked nor expired.
pub fn verify(record: &TokenRecord, secret: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
    if record.is_revoked() {
        return Err(AuthError::Revoked);
    }
    if record.is_expired(now) {
        return Err(AuthError::Expired);
    }
    if !constant_time_eq(&record.token_hash, &hash_secret(secret)) {
        return Err(AuthError::Malformed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_verifies_against_its_own_record() {
        let minted = mint("ci".to_string(), vec![], None);
        let (id, secret) = parse_wire_token(&minted.wire_token).unwrap();
        assert_eq!(id, minted.record.id);
        assert!(verify(&minted.record, secret, Utc::now()).is_ok());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let minted = mint("ci".to_string(), vec![], None);
        assert!(verify(&minted.record, "wrong-secret", Utc::now()).is_err());
    }

    #[test]
    fn revoked_token_fails_verification() {
        let mut minted = mint("ci".to_string(), vec![], None);
        minted.record.revoked_at = Some(Utc::now());
        let (_, secret) = parse_wire_token(&minted.wire_token).unwrap();
        assert!(matches!(
            verify(&minted.record, secret, Utc::now()),
            Err(AuthError::Revoked)
        ));
    }

    #[test]
    fn expired_token_fails_verification() {
        let mut minted = mint("ci".to_string(), vec![], None);
        minted.record.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        let (_, secret) = parse_wire_token(&minted.wire_token).unwrap();
        assert!(matches!(
            verify(&minted.record, secret, Utc::now()),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn malformed_bearer_has_no_dot() {
        assert!(matches!(parse_wire_token("not-a-token"), Err(AuthError::Malformed)));
    }
}
