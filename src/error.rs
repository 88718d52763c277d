//! Error type shared by every solver in the crate.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TspError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Missing, contradictory or malformed caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A produced tour or tree broke an internal invariant. Never expected.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
    /// An exact search ran out of budget before finding any complete tour.
    #[error("no solution found: {0}")]
    NoSolution(String),
}

pub type Result<T> = std::result::Result<T, TspError>;

impl TspError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn no_solution(message: impl Into<String>) -> Self {
        Self::NoSolution(message.into())
    }
}
