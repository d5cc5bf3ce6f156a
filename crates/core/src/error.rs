// Application error taxonomy shared by every netbill crate

use thiserror::Error;

use crate::domain::DomainError;
use crate::port::TransportError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Rejected input (enqueue requests, config values)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Storage adapter failure; sqlx errors are flattened to text in infra-sqlite
    #[error("storage: {0}")]
    Database(String),

    #[error("malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("misconfigured: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("not allowed now: {0}")]
    InvalidState(String),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("unexpected: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        assert_eq!(AppError::NotFound("job dispatch".into()).to_string(), "job dispatch not found");
        assert_eq!(
            AppError::from(TransportError::Timeout(30000)).to_string(),
            format!("transport: {}", TransportError::Timeout(30000))
        );
        let domain = DomainError::InvalidPriority(101);
        assert_eq!(AppError::from(domain).to_string(), "priority 101 is outside 0..=100");
    }
}
