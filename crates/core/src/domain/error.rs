// Rule violations raised by domain types before anything touches storage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("job cannot move from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("bad trigger: {0}")]
    InvalidTrigger(String),

    #[error("priority {0} is outside 0..=100")]
    InvalidPriority(i32),

    #[error("{0}")]
    ValidationError(String),

    #[error("domain invariant broken: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
