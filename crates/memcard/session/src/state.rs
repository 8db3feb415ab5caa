//! States of the card session

use derive_more::Display;

/// State of the card session machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum State {
    /// Re-detect the reader
    #[display("INITIAL")]
    Initial,
    /// Decide between waiting for a reader and checking for a card
    #[display("CHECK_READER")]
    CheckReader,
    /// Block until a reader arrives or leaves
    #[display("WAIT_READER")]
    WaitReader,
    /// Probe for a card in the reader
    #[display("CHECK_CARD")]
    CheckCard,
    /// Block until a card is inserted or removed
    #[display("WAIT_CARD")]
    WaitCard,
    /// Open a card handle
    #[display("CONNECT")]
    Connect,
    /// Read reader information, select the card type and read the error counter
    #[display("IDENTIFY")]
    Identify,
    /// Read the user record
    #[display("READ")]
    Read,
    /// Initialize a blank card
    #[display("SET_PIN")]
    SetPin,
    /// Unlock the card with the application PIN
    #[display("PRESENT_PIN")]
    PresentPin,
    /// Block until an update is requested or the card changes
    #[display("WAIT_USER")]
    WaitUser,
    /// Write the updated user record
    #[display("UPDATE")]
    Update,
    /// Release the card handle and clear the session
    #[display("DISCONNECT")]
    Disconnect,
    /// Hold a faulty or locked card until it is removed
    #[display("ERROR")]
    Error,
}

impl State {
    /// Check whether the session holds a card handle in this state
    pub const fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Identify
                | Self::Read
                | Self::SetPin
                | Self::PresentPin
                | Self::WaitUser
                | Self::Update
                | Self::Disconnect
                | Self::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(State::Initial.to_string(), "INITIAL");
        assert_eq!(State::SetPin.to_string(), "SET_PIN");
        assert_eq!(State::WaitUser.to_string(), "WAIT_USER");
    }

    #[test]
    fn test_connected_cluster() {
        assert!(!State::Connect.is_connected());
        assert!(State::Identify.is_connected());
        assert!(State::Error.is_connected());
        assert!(!State::WaitCard.is_connected());
    }
}
