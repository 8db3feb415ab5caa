//! Card session for SLE44xx memory cards behind a PC/SC reader
//!
//! The session tracks reader and card presence, connects the card, unlocks it with the
//! application PIN and keeps a 16-byte account record readable to observers. Updates
//! requested through [`SessionHandle::request_update`] are written back on the session
//! thread.
//!
//! ```no_run
//! use memcard_session::{SessionConfig, SessionManager, REGULAR_ID};
//!
//! # fn main() -> memcard_session::Result<()> {
//! let mut manager = SessionManager::new(SessionConfig::load(None)?);
//! manager.start()?;
//!
//! if manager.card_ready() {
//!     manager.request_update(50, REGULAR_ID);
//! }
//!
//! manager.stop();
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod constants;
mod error;
mod events;
mod handle;
mod machine;
mod manager;
mod presence;
mod state;

pub use config::{ENV_PREFIX, SessionConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use handle::{SessionHandle, SessionSnapshot, UpdateRequest};
pub use machine::CardSession;
pub use manager::{SessionManager, THREAD_NAME};
pub use presence::{PresenceState, PresenceTracker};
pub use state::State;
