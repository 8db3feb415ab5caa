//! Error types for PC/SC transport

use memcard_apdu_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// Error reported by the PC/SC service
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// Reader name cannot be passed to PC/SC
    #[error("Invalid reader name: {0}")]
    InvalidReaderName(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(e) => transport_error(e),
            PcscError::InvalidReaderName(_) => Self::Connection,
            PcscError::NoCard(_) => Self::NoCard,
        }
    }
}

/// Map a raw PC/SC error onto the transport error it stands for
pub(crate) fn transport_error(error: pcsc::Error) -> TransportError {
    match error {
        pcsc::Error::Cancelled => TransportError::Cancelled,
        pcsc::Error::Timeout => TransportError::Timeout,
        pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard | pcsc::Error::ResetCard => {
            TransportError::NoCard
        }
        pcsc::Error::NoReadersAvailable
        | pcsc::Error::ReaderUnavailable
        | pcsc::Error::UnknownReader
        | pcsc::Error::NoService
        | pcsc::Error::ServiceStopped => TransportError::Connection,
        e => TransportError::Driver(e as i64),
    }
}
