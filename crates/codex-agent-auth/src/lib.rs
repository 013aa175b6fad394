//! Opaque token auth (§3, §6): minting, hashing, constant-time
//! comparison, wildcard permission matching, and the static-vs-managed
//! auth context.

pub mod constant_time;
pub mod context;
pub mod error;
pub mod manager;
pub mod token;

pub use constant_time::constant_time_eq;
pub use context::AuthContext;
pub use error::AuthError;
pub use manager::AuthManager;
pub use token::{hash_secret, mint, parse_wire_token, verify, MintedToken};
