//! The HTTP/WebSocket daemon boundary (§6): REST + SSE routes, CORS,
//! Bearer/managed-token auth dispatch, the `/ws` protocol, and the
//! daemon pid-file lifecycle that the CLI's `daemon` subcommand drives.

pub mod auth;
pub mod cors;
pub mod dto;
pub mod error;
pub mod lifecycle;
pub mod pidfile;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use lifecycle::{daemon_status, start_daemon, stop_daemon, LifecycleError};
pub use server::{router, serve};
pub use state::{AppState, DaemonConfig};
