use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no config directory could be resolved")]
    NoConfigDir,
}
