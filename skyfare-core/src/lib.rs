pub mod booking;
pub mod events;
pub mod flight;
pub mod identity;
pub mod payment;
pub mod repository;
pub mod user;

/// Error raised while parsing a persisted status string back into its enum.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized status value: {0}")]
pub struct ParseStatusError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl DomainError {
    /// Wraps a failure from the external backend. The original cause is
    /// stringified; callers log it before it reaches the HTTP layer.
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        DomainError::Backend(err.to_string())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
