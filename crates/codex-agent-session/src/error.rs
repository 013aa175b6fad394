use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Supervisor(#[from] codex_agent_supervisor::SupervisorError),

    #[error(transparent)]
    Rollout(#[from] codex_agent_rollout::RolloutError),

    #[error("failed to watch rollout file: {0}")]
    Watch(String),
}
