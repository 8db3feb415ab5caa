//! Session configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `MEMCARD_`-prefixed environment variables.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use memcard_apdu_core::Pin;
use serde::{Deserialize, Serialize};

use crate::constants::{
    ADMIN_ID, APP_PIN, ERROR_DELAY_MS, MAGIC, PROBE_TIMEOUT_MS, REGULAR_ID, USER_AREA_ADDRESS,
};
use crate::error::Result;

/// Prefix of environment variables overriding configuration values
pub const ENV_PREFIX: &str = "MEMCARD_";

/// Configuration of a card session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Application PIN
    pub pin: [u8; 3],
    /// Factory PIN of blank cards
    pub default_pin: [u8; 3],
    /// Canonical record magic
    pub magic: u32,
    /// Id whose updates add to the value
    pub regular_id: u32,
    /// Id used for resetting accounts
    pub admin_id: u32,
    /// Address of the user record
    pub user_area_address: u8,
    /// Card presence probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Pause in the error state in milliseconds
    pub error_delay_ms: u64,
    /// Reader wait timeout in milliseconds, forever if unset
    pub reader_timeout_ms: Option<u64>,
    /// Card wait timeout in milliseconds, forever if unset
    pub card_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pin: *APP_PIN.as_bytes(),
            default_pin: *Pin::FACTORY_DEFAULT.as_bytes(),
            magic: MAGIC,
            regular_id: REGULAR_ID,
            admin_id: ADMIN_ID,
            user_area_address: USER_AREA_ADDRESS,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            error_delay_ms: ERROR_DELAY_MS,
            reader_timeout_ms: None,
            card_timeout_ms: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("pin", &"***")
            .field("magic", &format_args!("{:#010X}", self.magic))
            .field("regular_id", &self.regular_id)
            .field("admin_id", &self.admin_id)
            .field("user_area_address", &self.user_area_address)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .field("error_delay_ms", &self.error_delay_ms)
            .field("reader_timeout_ms", &self.reader_timeout_ms)
            .field("card_timeout_ms", &self.card_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the layered figment, reading `path` if given
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// Application PIN
    pub const fn pin(&self) -> Pin {
        Pin::new(self.pin)
    }

    /// Factory PIN of blank cards
    pub const fn default_pin(&self) -> Pin {
        Pin::new(self.default_pin)
    }

    /// Card presence probe timeout
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Pause in the error state
    pub const fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    /// Reader wait timeout, `None` waits forever
    pub fn reader_timeout(&self) -> Option<Duration> {
        self.reader_timeout_ms.map(Duration::from_millis)
    }

    /// Card wait timeout, `None` waits forever
    pub fn card_timeout(&self) -> Option<Duration> {
        self.card_timeout_ms.map(Duration::from_millis)
    }

    /// Set the application PIN
    pub const fn with_pin(mut self, pin: Pin) -> Self {
        self.pin = *pin.as_bytes();
        self
    }

    /// Set the factory PIN of blank cards
    pub const fn with_default_pin(mut self, pin: Pin) -> Self {
        self.default_pin = *pin.as_bytes();
        self
    }

    /// Set the canonical record magic
    pub const fn with_magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Set the regular and admin account ids
    pub const fn with_ids(mut self, regular_id: u32, admin_id: u32) -> Self {
        self.regular_id = regular_id;
        self.admin_id = admin_id;
        self
    }

    /// Set the address of the user record
    pub const fn with_user_area_address(mut self, address: u8) -> Self {
        self.user_area_address = address;
        self
    }

    /// Set the card presence probe timeout
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the pause in the error state
    pub const fn with_error_delay(mut self, delay: Duration) -> Self {
        self.error_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the reader and card wait timeouts
    pub fn with_wait_timeouts(mut self, reader: Option<Duration>, card: Option<Duration>) -> Self {
        self.reader_timeout_ms = reader.map(|d| d.as_millis() as u64);
        self.card_timeout_ms = card.map(|d| d.as_millis() as u64);
        self
    }
}
