use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("group {0} is paused")]
    GroupPaused(String),
}
