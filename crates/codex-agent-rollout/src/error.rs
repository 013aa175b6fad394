use thiserror::Error;

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rollout file has no discoverable session metadata")]
    MissingSessionMeta,
}
