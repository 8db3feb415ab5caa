//! Status word definitions for memory-card responses

use derive_more::Display;
use tracing::Level;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{sw1:02X} {sw2:02X}")]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if this is the answer to PRESENT CODE, where SW2 carries the error counter
    pub const fn is_code_presented(&self) -> bool {
        self.sw1 == 0x90
    }

    /// Check if this status word indicates a wrong length (67 00)
    pub const fn is_wrong_length(&self) -> bool {
        self.sw1 == 0x67 && self.sw2 == 0x00
    }

    /// Check if this status word indicates the card type was not selected or not supported (6A 82)
    pub const fn is_card_not_supported(&self) -> bool {
        self.sw1 == 0x6A && self.sw2 == 0x82
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() || self.is_code_presented() {
            Level::DEBUG
        } else if self.sw1 == 0x62 || self.sw1 == 0x63 {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x90, 0x07) => "Code presented, all retries left",
            (0x90, 0x00..=0x06) => "Code presentation failed",
            (0x62, 0x81) => "Part of returned data may be corrupted",
            (0x63, 0x00) => "Verification failed",
            (0x65, 0x81) => "Memory failure",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x82) => "Security status not satisfied, present the PIN first",
            (0x69, 0x83) => "Authentication method blocked",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "Card type not supported or not selected",
            (0x6A, 0x86) => "Incorrect parameters P1-P2",
            (0x6B, 0x00) => "Wrong parameters P1-P2",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            (0x6F, 0x00) => "No precise diagnosis",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

/// Common status words
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// PRESENT CODE accepted with the full error counter (90 07)
    pub const CODE_ACCEPTED: StatusWord = StatusWord::new(0x90, 0x07);

    /// Wrong length (67 00)
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);

    /// Write or PIN change attempted before the PIN was presented (69 82)
    pub const SECURITY_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);

    /// Card type not supported (6A 82)
    pub const CARD_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6A, 0x82);

    /// Class not supported (6E 00)
    pub const CLASS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6E, 0x00);
}
