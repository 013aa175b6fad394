use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
