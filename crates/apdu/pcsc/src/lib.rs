//! PC/SC transport for SLE44xx memory cards
//!
//! This crate implements the reader-side primitives a card session is built on:
//!
//! - [`ReaderContext`]: enumerate readers, wait for reader or card state changes
//!   (edge-triggered, with timeout and cross-thread cancellation) and connect a card
//! - [`PcscContext`]: the implementation on top of the system PC/SC service
//! - [`PcscCard`]: a connected card handle implementing
//!   [`CardTransport`](memcard_apdu_core::CardTransport)
//!
//! # Examples
//!
//! ```no_run
//! use memcard_apdu_core::MemoryCard;
//! use memcard_apdu_transport_pcsc::{PcscContext, ReaderContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = PcscContext::establish()?;
//!
//! let Some(reader) = context.list_readers()?.into_iter().next() else {
//!     println!("No readers found");
//!     return Ok(());
//! };
//!
//! let mut card = context.connect(&reader)?;
//! let info = MemoryCard::new(&mut card).reader_info()?;
//! println!("{reader}: firmware {}", info.firmware);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod reader;
mod status;
mod transport;

pub use config::{PcscConfig, ShareMode};
pub use context::{CancelHandle, PcscCanceller, PcscContext, ReaderContext, StatusTarget};
pub use error::PcscError;
pub use reader::PcscReader;
pub use status::ReaderStatus;
pub use transport::PcscCard;

// Re-export some pcsc types for convenience
pub use pcsc::{Disposition, Protocols, State};

/// Check whether a reader event state reports a card in the reader
pub fn card_in_reader(state: State) -> bool {
    state.contains(State::PRESENT) && !state.contains(State::EMPTY)
}
