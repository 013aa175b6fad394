//! The dispatch engine (§4.8, §4.9): the group runner (bounded-concurrency
//! fan-out of one prompt across N sessions) and the queue runner
//! (sequential prompt execution with a between-prompts stop signal and
//! post-prompt persistence).

pub mod error;
pub mod group_runner;
pub mod queue_runner;

pub use error::DispatchError;
pub use group_runner::{run_group, GroupEvent, DEFAULT_MAX_CONCURRENT};
pub use queue_runner::{run_queue, queue_split, QueueEvent, QueueSplit, StopSignal};
