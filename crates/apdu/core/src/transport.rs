//! Transport traits for APDU communication with cards
//!
//! A transport sends raw command bytes to a connected card and returns the raw response,
//! status word included. It has no knowledge of command structure.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the context or connect to the reader
    #[error("Failed to connect to device")]
    Connection,

    /// Failed to transmit data
    #[error("Failed to transmit data")]
    Transmission,

    /// No card in the reader, or the card was removed
    #[error("No card present")]
    NoCard,

    /// A wait expired before anything changed
    #[error("Operation timed out")]
    Timeout,

    /// A blocking wait was cancelled from another thread
    #[error("Operation cancelled")]
    Cancelled,

    /// Driver error (with code)
    #[error("Driver error code: {0:#010X}")]
    Driver(i64),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Check whether the error means the reader or card went away
    pub const fn is_removal(&self) -> bool {
        matches!(self, Self::NoCard | Self::Connection)
    }
}

/// Trait for a connected card handle
///
/// Implementations wrap one connected card. Dropping a handle must release the card,
/// but callers are expected to call [`CardTransport::disconnect`] explicitly on every path
/// that leaves the connected state.
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to the card and return the response bytes
    ///
    /// `max_response` is the size of the receive buffer, status bytes included.
    fn transmit_raw(&mut self, command: &[u8], max_response: usize) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode_upper(command), "SEND");
        let result = self.do_transmit_raw(command, max_response);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "RECV");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8], max_response: usize) -> Result<Bytes, TransportError>;

    /// Check if the handle is still connected to a card
    fn is_connected(&self) -> bool;

    /// Disconnect from the card; further transmits fail with [`TransportError::NoCard`]
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8], max_response: usize) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command, max_response)
    }

    fn do_transmit_raw(&mut self, command: &[u8], max_response: usize) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command, max_response)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect()
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    /// Mock responses to return, in order
    pub(crate) responses: Vec<Bytes>,
    /// Commands that were sent
    pub(crate) commands: Vec<Bytes>,
    /// Whether the transport is connected
    pub(crate) connected: bool,
}

#[cfg(test)]
impl MockTransport {
    /// Create a new mock transport with the given responses
    pub(crate) fn new(responses: &[&[u8]]) -> Self {
        Self {
            responses: responses.iter().map(|r| Bytes::copy_from_slice(r)).collect(),
            commands: Vec::new(),
            connected: true,
        }
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8], _max_response: usize) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::NoCard);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        if self.responses.is_empty() {
            return Err(TransportError::Transmission);
        }
        Ok(self.responses.remove(0))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }
}
