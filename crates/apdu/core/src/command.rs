//! Memory-card command definitions
//!
//! The reader exposes memory cards through pseudo-APDUs with `CLA = FF`. Lc and Le are
//! always short (one byte), so the encoding is `CLA INS P1 P2 [Lc data] [Le]`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::response::status::{StatusWord, common};
use crate::types::Pin;

/// Class byte of all reader pseudo-APDUs
pub const CLA_READER: u8 = 0xFF;

/// GET_READER_INFORMATION
pub const INS_READER_INFO: u8 = 0x09;
/// SELECT_CARD_TYPE
pub const INS_SELECT_CARD_TYPE: u8 = 0xA4;
/// READ_MEMORY_CARD
pub const INS_READ_MEMORY: u8 = 0xB0;
/// READ_PRESENTATION_ERROR_COUNTER_MEMORY_CARD
pub const INS_ERROR_COUNTER: u8 = 0xB1;
/// PRESENT_CODE_MEMORY_CARD
pub const INS_PRESENT_CODE: u8 = 0x20;
/// CHANGE_CODE_MEMORY_CARD
pub const INS_CHANGE_CODE: u8 = 0xD2;
/// WRITE_MEMORY_CARD
pub const INS_WRITE_MEMORY: u8 = 0xD0;

/// Card type selector for SLE 4432/4442/5532/5542
pub const CARD_TYPE_SLE44XX: u8 = 0x06;

/// Length of the reader information block
pub const READER_INFO_LEN: u8 = 0x10;

/// Length of the error counter block (counter + three PIN echo bytes)
pub const ERROR_COUNTER_LEN: u8 = 0x04;

/// APDU command with the response it is expected to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Instruction code (INS)
    instruction: u8,
    /// First parameter (P1)
    p1: u8,
    /// Second parameter (P2)
    p2: u8,
    /// Command payload data
    data: Option<Bytes>,
    /// Expected response length (Le)
    le: Option<u8>,
    /// Status word the command succeeds with
    success: StatusWord,
}

impl Command {
    /// Create a new command with no data and no Le
    pub const fn new(instruction: u8, p1: u8, p2: u8) -> Self {
        Self {
            instruction,
            p1,
            p2,
            data: None,
            le: None,
            success: common::SUCCESS,
        }
    }

    /// Attach command data
    ///
    /// # Errors
    /// Returns [`Error::InvalidLength`] if the data does not fit a one-byte Lc.
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Result<Self, Error> {
        let data = data.into();
        if data.len() > u8::MAX as usize {
            return Err(Error::InvalidLength(data.len()));
        }
        self.data = Some(data);
        Ok(self)
    }

    /// Set the expected response length
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Set the status word this command succeeds with
    pub const fn with_success(mut self, success: StatusWord) -> Self {
        self.success = success;
        self
    }

    /// GET_READER_INFORMATION: `FF 09 00 00 10`
    pub const fn reader_info() -> Self {
        Self::new(INS_READER_INFO, 0x00, 0x00).with_le(READER_INFO_LEN)
    }

    /// SELECT_CARD_TYPE for SLE44xx cards: `FF A4 00 00 01 06`
    pub fn select_card_type() -> Self {
        Self {
            data: Some(Bytes::from_static(&[CARD_TYPE_SLE44XX])),
            ..Self::new(INS_SELECT_CARD_TYPE, 0x00, 0x00)
        }
    }

    /// READ_MEMORY_CARD: `FF B0 00 <addr> <len>`
    pub const fn read_memory(address: u8, len: u8) -> Self {
        Self::new(INS_READ_MEMORY, 0x00, address).with_le(len)
    }

    /// READ_PRESENTATION_ERROR_COUNTER: `FF B1 00 00 04`
    pub const fn error_counter() -> Self {
        Self::new(INS_ERROR_COUNTER, 0x00, 0x00).with_le(ERROR_COUNTER_LEN)
    }

    /// PRESENT_CODE: `FF 20 00 00 03 p1 p2 p3`, succeeds with `90 07`
    pub fn present_pin(pin: &Pin) -> Self {
        Self {
            data: Some(Bytes::copy_from_slice(pin.as_bytes())),
            ..Self::new(INS_PRESENT_CODE, 0x00, 0x00).with_success(common::CODE_ACCEPTED)
        }
    }

    /// CHANGE_CODE: `FF D2 00 01 03 p1 p2 p3`
    pub fn change_pin(pin: &Pin) -> Self {
        Self {
            data: Some(Bytes::copy_from_slice(pin.as_bytes())),
            ..Self::new(INS_CHANGE_CODE, 0x00, 0x01)
        }
    }

    /// WRITE_MEMORY_CARD: `FF D0 00 <addr> <len> <data...>`
    ///
    /// # Errors
    /// Returns [`Error::InvalidLength`] if `data` is empty or longer than 255 bytes.
    pub fn write_memory(address: u8, data: &[u8]) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::InvalidLength(0));
        }
        Self::new(INS_WRITE_MEMORY, 0x00, address).with_data(Bytes::copy_from_slice(data))
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        CLA_READER
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.instruction
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command payload data
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected response length
    pub const fn expected_length(&self) -> Option<u8> {
        self.le
    }

    /// Number of payload bytes the response must carry
    pub fn response_len(&self) -> usize {
        self.le.map_or(0, usize::from)
    }

    /// Status word this command succeeds with
    pub const fn success(&self) -> StatusWord {
        self.success
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        4 + self.data.as_ref().map_or(0, |d| 1 + d.len()) + usize::from(self.le.is_some())
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_commands() {
        assert_eq!(
            Command::reader_info().to_bytes().as_ref(),
            &[0xFF, 0x09, 0x00, 0x00, 0x10]
        );
        assert_eq!(
            Command::select_card_type().to_bytes().as_ref(),
            &[0xFF, 0xA4, 0x00, 0x00, 0x01, 0x06]
        );
        assert_eq!(
            Command::read_memory(64, 16).to_bytes().as_ref(),
            &[0xFF, 0xB0, 0x00, 0x40, 0x10]
        );
        assert_eq!(
            Command::error_counter().to_bytes().as_ref(),
            &[0xFF, 0xB1, 0x00, 0x00, 0x04]
        );
    }

    #[test]
    fn test_pin_commands() {
        let pin = Pin::new([0x12, 0x34, 0x56]);
        let present = Command::present_pin(&pin);
        assert_eq!(
            present.to_bytes().as_ref(),
            &[0xFF, 0x20, 0x00, 0x00, 0x03, 0x12, 0x34, 0x56]
        );
        assert_eq!(present.success(), common::CODE_ACCEPTED);
        assert_eq!(present.response_len(), 0);

        let change = Command::change_pin(&pin);
        assert_eq!(
            change.to_bytes().as_ref(),
            &[0xFF, 0xD2, 0x00, 0x01, 0x03, 0x12, 0x34, 0x56]
        );
        assert_eq!(change.success(), common::SUCCESS);
    }

    #[test]
    fn test_write_memory() {
        let cmd = Command::write_memory(64, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            cmd.to_bytes().as_ref(),
            &[0xFF, 0xD0, 0x00, 0x40, 0x02, 0xAA, 0xBB]
        );
        assert_eq!(cmd.command_length(), 7);

        assert_eq!(Command::write_memory(0, &[]), Err(Error::InvalidLength(0)));
        assert_eq!(
            Command::write_memory(0, &[0u8; 256]),
            Err(Error::InvalidLength(256))
        );
    }
}
