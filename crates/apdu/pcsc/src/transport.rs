//! PC/SC card handle

use std::fmt;

use bytes::Bytes;
use memcard_apdu_core::{CardTransport, TransportError};
use pcsc::{Card, Disposition};
use tracing::{debug, warn};

use crate::error::transport_error;

/// Largest response a short APDU can produce: 256 payload bytes plus SW1 SW2
const MAX_RESPONSE: usize = 258;

/// Connected memory card
///
/// Dropping the handle disconnects the card with the configured disposition.
pub struct PcscCard {
    /// Card connection, `None` once disconnected
    card: Option<Card>,
    /// Reader the card sits in
    reader_name: String,
    /// Disposition applied on disconnect
    disposition: Disposition,
}

impl fmt::Debug for PcscCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscCard")
            .field("reader_name", &self.reader_name)
            .field("connected", &self.card.is_some())
            .field("disposition", &self.disposition)
            .finish()
    }
}

impl PcscCard {
    pub(crate) fn new(card: Card, reader_name: &str, disposition: Disposition) -> Self {
        Self {
            card: Some(card),
            reader_name: reader_name.to_string(),
            disposition,
        }
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }
}

impl CardTransport for PcscCard {
    fn do_transmit_raw(&mut self, command: &[u8], max_response: usize) -> Result<Bytes, TransportError> {
        let card = self.card.as_ref().ok_or(TransportError::NoCard)?;

        let mut buffer = vec![0u8; max_response.clamp(2, MAX_RESPONSE)];
        match card.transmit(command, &mut buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e) => {
                if matches!(e, pcsc::Error::RemovedCard | pcsc::Error::ResetCard) {
                    debug!(reader = %self.reader_name, error = %e, "Card went away during transmit");
                    self.card = None;
                }
                Err(transport_error(e))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(card) = self.card.take() else {
            return Ok(());
        };

        card.disconnect(self.disposition).map_err(|(_, e)| {
            debug!(reader = %self.reader_name, error = %e, "Disconnect failed");
            transport_error(e)
        })
    }
}

impl Drop for PcscCard {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!(reader = %self.reader_name, error = %e, "Failed to release card");
        }
    }
}
