//! Error type for the card session

use memcard_apdu_core::TransportError;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// APDU exchange errors
    #[error(transparent)]
    Apdu(#[from] memcard_apdu_core::Error),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The session thread could not be spawned
    #[error("Failed to spawn session thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The session is already running
    #[error("Session already running")]
    AlreadyRunning,
}

impl From<figment::Error> for Error {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}
