//! # Error Types
//!
//! Error handling for the leadership election service.
//!
//! Very few errors ever reach a caller: the service facade rejects bad
//! arguments and unsupported operations, and everything that goes wrong
//! inside an election loop is logged and absorbed into a state transition.

use thiserror::Error;

/// Errors surfaced by the leadership election service.
#[derive(Error, Debug)]
pub enum BallotError {
    /// A facade entry point was called with an invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The requested operation is deliberately not provided
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    /// The clustering substrate failed a lock or topic operation
    #[error("Substrate error: {message}")]
    Substrate { message: String },

    /// Encoding or decoding a leadership event failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Unexpected internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results in the leadership election service.
pub type Result<T> = std::result::Result<T, BallotError>;

impl BallotError {
    /// Creates a new invalid-argument error with the given message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a new unsupported-operation error with the given message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a new substrate error with the given message.
    pub fn substrate(message: impl Into<String>) -> Self {
        Self::Substrate {
            message: message.into(),
        }
    }

    /// Creates a new serialization error with the given message.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
