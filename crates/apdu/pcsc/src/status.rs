//! Reader event state as observed by a state-change wait

use pcsc::{ReaderState, State};

use crate::card_in_reader;

/// Mask of the card event counter PC/SC keeps in the upper half of the event state
const EVENT_COUNT_MASK: u32 = 0xFFFF;

/// Event state reported for a reader, together with its card event counter
///
/// A wait baseline must carry the counter PC/SC keeps in the high 16 bits of the event
/// state; [`pcsc::State`] on its own drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderStatus {
    state: State,
    event_count: u32,
}

impl Default for ReaderStatus {
    fn default() -> Self {
        Self::UNAWARE
    }
}

impl ReaderStatus {
    /// Nothing known yet; the next wait returns the current state immediately
    pub const UNAWARE: Self = Self {
        state: State::UNAWARE,
        event_count: 0,
    };

    /// Create a status from state flags and a card event counter
    pub const fn new(state: State, event_count: u32) -> Self {
        Self {
            state,
            event_count: event_count & EVENT_COUNT_MASK,
        }
    }

    /// State flags
    pub const fn state(&self) -> State {
        self.state
    }

    /// Card event counter
    pub const fn event_count(&self) -> u32 {
        self.event_count
    }

    /// Check whether a card sits in the reader
    pub fn card_present(&self) -> bool {
        card_in_reader(self.state)
    }

    /// Check whether the wait reported a change
    pub const fn is_changed(&self) -> bool {
        self.state.contains(State::CHANGED)
    }

    /// Status reported by the last wait on `reader_state`
    pub(crate) fn from_reader_state(reader_state: &ReaderState) -> Self {
        Self::new(reader_state.event_state(), reader_state.event_count())
    }

    /// Raw current-state word for the next wait: flags without `CHANGED`, plus the counter
    pub(crate) fn baseline(&self) -> State {
        let flags = self.state.difference(State::CHANGED).bits();
        State::from_bits_retain(flags | (pcsc::ffi::DWORD::from(self.event_count) << 16))
    }
}
