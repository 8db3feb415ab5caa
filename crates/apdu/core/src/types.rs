//! Data blocks exchanged with the reader and the memory card

use std::fmt;

use crate::error::Error;

/// Length of the firmware string at the start of the reader information block
pub const FIRMWARE_LEN: usize = 10;

/// Three-byte programmable security code (PSC) of an SLE4442 card
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Pin([u8; 3]);

impl Pin {
    /// Factory default code of blank SLE4442 cards
    pub const FACTORY_DEFAULT: Self = Self([0xFF, 0xFF, 0xFF]);

    /// Create a PIN from its three bytes
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    /// Get the raw PIN bytes
    pub const fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl From<[u8; 3]> for Pin {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// Reader information block returned by GET_READER_INFORMATION
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderInfo {
    /// Firmware version string
    pub firmware: String,
    /// Maximum number of bytes the reader accepts in one command
    pub max_send: u8,
    /// Maximum number of bytes the reader returns in one response
    pub max_recv: u8,
    /// Bitmap of supported card types
    pub card_types: u16,
    /// Currently selected card type
    pub selected_card: u8,
    /// Card status byte
    pub card_status: u8,
}

impl ReaderInfo {
    /// Size of the encoded block
    pub const LEN: usize = 16;
}

impl TryFrom<&[u8]> for ReaderInfo {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::LEN {
            return Err(Error::UnexpectedLength {
                expected: Self::LEN,
                actual: data.len(),
            });
        }

        let firmware = String::from_utf8_lossy(&data[..FIRMWARE_LEN])
            .trim_end_matches('\0')
            .to_string();

        Ok(Self {
            firmware,
            max_send: data[10],
            max_recv: data[11],
            card_types: u16::from_be_bytes([data[12], data[13]]),
            selected_card: data[14],
            card_status: data[15],
        })
    }
}

/// Presentation error counter of an SLE4442 card
///
/// Counter values observed on cards: `7` after a successful presentation, `3` and `1`
/// after failed ones, `0` once the card is locked for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCounter {
    /// Remaining presentation attempts
    pub retries: u8,
    /// PIN bytes echoed by the card; zero until the code has been presented
    pub pin_echo: [u8; 3],
}

impl ErrorCounter {
    /// Size of the encoded block
    pub const LEN: usize = 4;

    /// Counter value of a card with all attempts left
    pub const FULL_RETRIES: u8 = 7;

    /// Check whether the card accepts no further presentations
    pub const fn is_locked(&self) -> bool {
        self.retries == 0
    }

    /// Check whether the card echoes `pin`, meaning it was already presented this power cycle
    pub fn echoes(&self, pin: &Pin) -> bool {
        &self.pin_echo == pin.as_bytes()
    }
}

impl TryFrom<&[u8]> for ErrorCounter {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        match *data {
            [retries, a, b, c] => Ok(Self {
                retries,
                pin_echo: [a, b, c],
            }),
            _ => Err(Error::UnexpectedLength {
                expected: Self::LEN,
                actual: data.len(),
            }),
        }
    }
}

/// Account record stored in the card's user area
///
/// Four little-endian 32-bit words: magic, id, total, value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UserRecord {
    /// Marks the record as written by this application
    pub magic: u32,
    /// Account id
    pub id: u32,
    /// Total credit
    pub total: u32,
    /// Remaining credit
    pub value: u32,
}

impl UserRecord {
    /// Size of the encoded record
    pub const LEN: usize = 16;

    /// Magic read from a card that was never written (erased memory is all `FF`)
    pub const BLANK_MAGIC: u32 = 0xFFFF_FFFF;

    /// Create a record
    pub const fn new(magic: u32, id: u32, total: u32, value: u32) -> Self {
        Self {
            magic,
            id,
            total,
            value,
        }
    }

    /// Check whether the record comes from a blank card
    pub const fn is_blank(&self) -> bool {
        self.magic == Self::BLANK_MAGIC
    }

    /// Encode the record
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        for (chunk, word) in out
            .chunks_exact_mut(4)
            .zip([self.magic, self.id, self.total, self.value])
        {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

impl TryFrom<&[u8]> for UserRecord {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::LEN {
            return Err(Error::UnexpectedLength {
                expected: Self::LEN,
                actual: data.len(),
            });
        }

        let word = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        Ok(Self {
            magic: word(0),
            id: word(4),
            total: word(8),
            value: word(12),
        })
    }
}

impl From<[u8; UserRecord::LEN]> for UserRecord {
    fn from(data: [u8; UserRecord::LEN]) -> Self {
        let word = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        Self {
            magic: word(0),
            id: word(4),
            total: word(8),
            value: word(12),
        }
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "magic={:#010X} id={} total={} value={}",
            self.magic, self.id, self.total, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_layout() {
        let record = UserRecord::new(0x4D45_4D43, 1, 150, 120);
        let bytes = record.to_bytes();
        assert_eq!(&bytes[0..4], &[0x43, 0x4D, 0x45, 0x4D]);
        assert_eq!(&bytes[4..8], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[150, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[12..16], &[120, 0x00, 0x00, 0x00]);
        assert_eq!(UserRecord::try_from(&bytes[..]).unwrap(), record);
        assert_eq!(UserRecord::from(bytes), record);
    }

    #[test]
    fn test_blank_record() {
        let record = UserRecord::from([0xFF; UserRecord::LEN]);
        assert!(record.is_blank());
        assert_eq!(record.value, u32::MAX);

        let record = UserRecord::from([0u8; UserRecord::LEN]);
        assert!(!record.is_blank());
    }

    #[test]
    fn test_user_record_wrong_length() {
        assert_eq!(
            UserRecord::try_from(&[0u8; 15][..]),
            Err(Error::UnexpectedLength {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_reader_info() {
        let mut data = *b"ACR38U-CCI\x10\x20\x00\x7F\x06\x01";
        let info = ReaderInfo::try_from(&data[..]).unwrap();
        assert_eq!(info.firmware, "ACR38U-CCI");
        assert_eq!(info.max_send, 0x10);
        assert_eq!(info.max_recv, 0x20);
        assert_eq!(info.card_types, 0x007F);
        assert_eq!(info.selected_card, 0x06);
        assert_eq!(info.card_status, 0x01);

        data[6..10].copy_from_slice(&[0; 4]);
        assert_eq!(ReaderInfo::try_from(&data[..]).unwrap().firmware, "ACR38U");
    }

    #[test]
    fn test_error_counter() {
        let counter = ErrorCounter::try_from(&[0x07, 0x12, 0x34, 0x56][..]).unwrap();
        assert_eq!(counter.retries, 7);
        assert!(!counter.is_locked());
        assert!(counter.echoes(&Pin::new([0x12, 0x34, 0x56])));
        assert!(!counter.echoes(&Pin::FACTORY_DEFAULT));

        let counter = ErrorCounter::try_from(&[0x00, 0x00, 0x00, 0x00][..]).unwrap();
        assert!(counter.is_locked());

        assert!(ErrorCounter::try_from(&[0x07][..]).is_err());
    }

    #[test]
    fn test_pin_debug_is_redacted() {
        assert_eq!(format!("{:?}", Pin::new([1, 2, 3])), "Pin(***)");
    }
}
