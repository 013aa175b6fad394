//! Rollout file handling: the line codec, whole/partial file readers, and
//! the debounced filesystem watcher that feeds the session runtime.

pub mod codec;
pub mod error;
pub mod reader;
pub mod watcher;

pub use codec::{derive_provenance, parse};
pub use error::RolloutError;
pub use reader::{extract_first_user_message, parse_session_meta, read_all, stream_events};
pub use watcher::{RolloutEvent, RolloutWatcher};
