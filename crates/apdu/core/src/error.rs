//! Error type for memory-card APDU exchanges
//!
//! Every failure aborts the exchange that produced it. There is no retry at this level,
//! so the variants only need to tell a transport failure apart from a protocol failure.

use crate::response::status::StatusWord;
use crate::transport::TransportError;

/// Result type for APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for APDU operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The transport failed before a response was received
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response did not even contain a status word
    #[error("Incomplete response: {0} bytes")]
    Incomplete(usize),

    /// The card answered with a status word other than the expected one
    #[error("Unexpected status word {actual} ({}), expected {expected}", .actual.description())]
    UnexpectedStatus {
        /// Status word the command succeeds with
        expected: StatusWord,
        /// Status word returned by the card
        actual: StatusWord,
    },

    /// The response payload had the wrong length
    #[error("Unexpected response length {actual}, expected {expected}")]
    UnexpectedLength {
        /// Expected payload length
        expected: usize,
        /// Received payload length
        actual: usize,
    },

    /// Command data does not fit a short APDU
    #[error("Invalid command data length: {0}")]
    InvalidLength(usize),
}

impl Error {
    /// Check whether the error came from the transport rather than from the card
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check whether the transport wait or exchange was cancelled
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }

    /// Get the offending status word if this is a status error
    pub const fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}
