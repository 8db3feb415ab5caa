//! Application constants for the memory-card account

use memcard_apdu_core::Pin;

/// Magic marking a user record as written by this application ("MEMC")
pub const MAGIC: u32 = 0x4D45_4D43;

/// Id of regular accounts; updates on these add to the value
pub const REGULAR_ID: u32 = 0x0000_0001;

/// Id of admin accounts; updates on these reset the value to zero
pub const ADMIN_ID: u32 = 0x0000_00AD;

/// Application PIN written to blank cards
///
/// Anyone with this source can unlock the cards. Deployments must override it through
/// the configuration.
pub const APP_PIN: Pin = Pin::new([0x12, 0x34, 0x56]);

/// Address of the 16-byte user record in card memory
pub const USER_AREA_ADDRESS: u8 = 64;

/// Timeout of the card presence probe, in milliseconds
pub const PROBE_TIMEOUT_MS: u64 = 1;

/// Pause in the error state before presence is checked again, in milliseconds
pub const ERROR_DELAY_MS: u64 = 1000;
