//! The session runtime (§4.6, §4.7): `RunningSession` fuses a supervised
//! subprocess with a rollout-file tailer into one ordered stream of
//! chunks; the normalizer maps that stream into provider-agnostic
//! events; `FileChangeTracker` derives the changed-file summary.

pub mod chunk;
pub mod error;
pub mod events;
pub mod file_changes;
pub mod normalizer;
pub mod running_session;
pub mod session_runtime;

pub use chunk::{assistant_text, CharChunk, Chunk};
pub use error::SessionError;
pub use events::{CompletionStats, SessionEvent, SessionEvents};
pub use file_changes::FileChangeTracker;
pub use normalizer::{NormalizedEvent, Normalizer, StartedMode};
pub use running_session::{RunningSession, StreamGranularity};
pub use session_runtime::{resume_session, start_session, StartConfig};
