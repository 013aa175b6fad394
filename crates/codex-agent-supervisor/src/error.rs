use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("process not found: {0}")]
    NotFound(String),

    #[error("process {0} is not running")]
    NotRunning(String),

    #[error("process {0} has no stdin pipe")]
    NoStdin(String),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
