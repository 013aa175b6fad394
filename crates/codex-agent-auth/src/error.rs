use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed bearer token")]
    Malformed,

    #[error("token not found")]
    NotFound,

    #[error("token is revoked")]
    Revoked,

    #[error("token is expired")]
    Expired,

    #[error("token lacks required permission: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Repo(#[from] codex_agent_repo::RepoError),
}
