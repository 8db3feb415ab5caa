//! Command implementations for the memcard CLI

mod readers;
mod session;

pub use readers::list_readers;
pub use session::{status_command, update_command, watch_command};
