mod error;
mod options;
mod process;
mod supervisor;

pub use error::SupervisorError;
pub use options::{push_common_flags, ForkOptions, SpawnOptions};
pub use process::{ProcessInfo, ProcessStatus};
pub use supervisor::{ExecResult, ExecStream, Supervisor};
