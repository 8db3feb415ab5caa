//! APDU codec for SLE44xx memory cards
//!
//! Memory cards (SLE4432/4442, SLE5532/5542) have no operating system of their own.
//! The reader translates a small set of pseudo-APDUs with `CLA = FF` into the card's
//! synchronous protocol. This crate provides:
//!
//! - Status word handling and response framing (payload + trailing SW1/SW2)
//! - The [`CardTransport`] trait implemented by concrete reader transports
//! - Builders for the seven memory-card commands
//! - [`MemoryCard`], which runs one command per call and checks the expected
//!   status word and response length
//! - Decoding of the reader information block, the PIN error counter and the
//!   16-byte [`UserRecord`]
//!
//! The codec never retries a failed exchange. The caller decides how to recover.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod card;
pub mod command;
pub mod response;
pub mod transport;
pub mod types;

mod error;
pub use error::{Error, Result};

pub use card::MemoryCard;
pub use command::Command;
pub use response::status::StatusWord;
pub use response::Response;
pub use transport::{CardTransport, TransportError};
pub use types::{ErrorCounter, Pin, ReaderInfo, UserRecord};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, CardTransport, Command, Error, ErrorCounter, MemoryCard, Pin, ReaderInfo,
        Response, Result, StatusWord, TransportError, UserRecord, response::status::common as status,
    };
}
