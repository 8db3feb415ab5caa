//! Memory-card command executor
//!
//! [`MemoryCard`] borrows a connected [`CardTransport`] and runs one command per call:
//! encode, transmit with the command's receive budget, split off the status word and
//! check it together with the payload length.

use std::fmt;

use tracing::{Level, debug, info, warn};

use crate::command::Command;
use crate::error::Result;
use crate::response::Response;
use crate::transport::CardTransport;
use crate::types::{ErrorCounter, Pin, ReaderInfo, UserRecord};

/// Status word bytes are appended to every response
const STATUS_LEN: usize = 2;

/// Command executor for SLE44xx memory cards
pub struct MemoryCard<'a, T: CardTransport + ?Sized> {
    transport: &'a mut T,
}

impl<T: CardTransport + ?Sized> fmt::Debug for MemoryCard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCard")
            .field("transport", &self.transport)
            .finish()
    }
}

impl<'a, T: CardTransport + ?Sized> MemoryCard<'a, T> {
    /// Wrap a connected transport
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        self.transport
    }

    /// Run a command and check its status word and payload length
    fn exchange(&mut self, command: &Command) -> Result<Response> {
        let raw = self
            .transport
            .transmit_raw(&command.to_bytes(), command.response_len() + STATUS_LEN)?;
        let response = Response::from_bytes(&raw)?;

        let status = response.status();
        if status != command.success() {
            let ins = command.instruction();
            match status.tracing_level() {
                Level::WARN => warn!(ins, %status, "{}", status.description()),
                Level::INFO => info!(ins, %status, "{}", status.description()),
                _ => debug!(ins, %status, "{}", status.description()),
            }
        }

        response
            .expect_status(command.success())?
            .expect_len(command.response_len())
    }

    /// Read the reader information block
    pub fn reader_info(&mut self) -> Result<ReaderInfo> {
        let response = self.exchange(&Command::reader_info())?;
        let info = ReaderInfo::try_from(response.payload().as_ref())?;
        debug!(firmware = %info.firmware, card_types = info.card_types, "Reader information");
        Ok(info)
    }

    /// Select the SLE44xx card type on the reader
    pub fn select_card_type(&mut self) -> Result<()> {
        self.exchange(&Command::select_card_type()).map(drop)
    }

    /// Read `len` bytes of main memory starting at `address`
    pub fn read_memory(&mut self, address: u8, len: u8) -> Result<Vec<u8>> {
        let response = self.exchange(&Command::read_memory(address, len))?;
        Ok(response.into_payload().to_vec())
    }

    /// Read the presentation error counter and the PIN echo bytes
    pub fn error_counter(&mut self) -> Result<ErrorCounter> {
        let response = self.exchange(&Command::error_counter())?;
        ErrorCounter::try_from(response.payload().as_ref())
    }

    /// Present the PIN; returns the remaining attempts reported in SW2
    ///
    /// A rejected PIN surfaces as [`crate::Error::UnexpectedStatus`] whose actual status still
    /// carries the remaining attempts in SW2.
    pub fn present_pin(&mut self, pin: &Pin) -> Result<u8> {
        let response = self.exchange(&Command::present_pin(pin))?;
        Ok(response.status().sw2)
    }

    /// Replace the PIN; the current PIN must have been presented
    pub fn change_pin(&mut self, pin: &Pin) -> Result<()> {
        self.exchange(&Command::change_pin(pin)).map(drop)
    }

    /// Write `data` to main memory starting at `address`
    pub fn write_memory(&mut self, address: u8, data: &[u8]) -> Result<()> {
        self.exchange(&Command::write_memory(address, data)?).map(drop)
    }

    /// Read and decode the user record stored at `address`
    pub fn read_user_record(&mut self, address: u8) -> Result<UserRecord> {
        let data = self.read_memory(address, UserRecord::LEN as u8)?;
        UserRecord::try_from(data.as_slice())
    }

    /// Encode and write the user record at `address`
    pub fn write_user_record(&mut self, address: u8, record: &UserRecord) -> Result<()> {
        self.write_memory(address, &record.to_bytes())
    }
}
