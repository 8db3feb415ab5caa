//! Reader and card presence tracking
//!
//! Every wait hands the last observed event state, card event counter included, back to
//! the reader context, so a wait only returns on a real change. Resetting the cached
//! state to `UNAWARE` makes the next wait return immediately with the current state.

use std::time::Duration;

use memcard_apdu_core::{ReaderInfo, TransportError};
use memcard_apdu_transport_pcsc::{ReaderContext, ReaderStatus, StatusTarget};
use tracing::{debug, info, trace};

use crate::events::SessionEvent;
use crate::handle::SessionHandle;

/// Cached reader and card presence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceState {
    /// Name of the reader in use, empty if none is attached
    pub reader_name: String,
    /// Last event state reported for the reader
    pub event_state: ReaderStatus,
    /// Information block of the reader, once a card was identified
    pub reader_info: Option<ReaderInfo>,
}

impl Default for PresenceState {
    fn default() -> Self {
        Self {
            reader_name: String::new(),
            event_state: ReaderStatus::UNAWARE,
            reader_info: None,
        }
    }
}

impl PresenceState {
    /// Check whether a reader is attached
    pub fn reader_present(&self) -> bool {
        !self.reader_name.is_empty()
    }

    /// Check whether the last event state reports a card
    pub fn card_present(&self) -> bool {
        self.event_state.card_present()
    }
}

/// Maintains the shared [`PresenceState`] from the session thread
#[derive(Debug)]
pub struct PresenceTracker {
    handle: SessionHandle,
}

impl PresenceTracker {
    /// Create a tracker publishing through `handle`
    pub const fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }

    /// Query the first attached reader and cache its name
    pub fn detect_reader<C: ReaderContext>(&self, context: &C) {
        let name = match context.list_readers() {
            Ok(readers) => readers.into_iter().next().unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "Failed to list readers");
                String::new()
            }
        };

        let mut status = self.handle.shared().status.lock();
        let presence = &mut status.presence;
        if presence.reader_name == name {
            return;
        }

        let had_card = presence.card_present();
        let previous = std::mem::replace(
            presence,
            PresenceState {
                reader_name: name.clone(),
                ..PresenceState::default()
            },
        );
        drop(status);

        if had_card {
            self.handle.emit(SessionEvent::CardRemoved);
        }
        if !previous.reader_name.is_empty() {
            info!(reader = %previous.reader_name, "Reader detached");
            self.handle.emit(SessionEvent::ReaderDetached);
        }
        if !name.is_empty() {
            info!(reader = %name, "Reader attached");
            self.handle.emit(SessionEvent::ReaderAttached(name));
        }
    }

    /// Check whether a reader is attached
    pub fn reader_present(&self) -> bool {
        self.handle.shared().status.lock().presence.reader_present()
    }

    /// Name of the cached reader
    pub fn reader_name(&self) -> String {
        self.handle.shared().status.lock().presence.reader_name.clone()
    }

    /// Block until a reader arrives or leaves
    pub fn wait_for_reader<C: ReaderContext>(
        &self,
        context: &C,
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        trace!("Waiting for reader");
        context
            .get_status_change(StatusTarget::Pnp, ReaderStatus::UNAWARE, timeout)
            .map(drop)
    }

    /// Check for a card change with a short timeout
    ///
    /// Returns whether a card is present. An expired probe means nothing changed.
    pub fn probe_card<C: ReaderContext>(
        &self,
        context: &C,
        timeout: Duration,
    ) -> Result<bool, TransportError> {
        match self.wait_for_card(context, Some(timeout)) {
            Ok(_) | Err(TransportError::Timeout) => Ok(self.card_present()),
            Err(e) => Err(e),
        }
    }

    /// Check whether the cached event state reports a card
    pub fn card_present(&self) -> bool {
        self.handle.shared().status.lock().presence.card_present()
    }

    /// Block until the card state of the cached reader changes
    pub fn wait_for_card<C: ReaderContext>(
        &self,
        context: &C,
        timeout: Option<Duration>,
    ) -> Result<ReaderStatus, TransportError> {
        let (name, current) = {
            let status = self.handle.shared().status.lock();
            (status.presence.reader_name.clone(), status.presence.event_state)
        };
        if name.is_empty() {
            return Err(TransportError::Connection);
        }

        let state = context.get_status_change(StatusTarget::Reader(&name), current, timeout)?;
        self.record_card_state(state);
        Ok(state)
    }

    fn record_card_state(&self, state: ReaderStatus) {
        let mut status = self.handle.shared().status.lock();
        let was_present = status.presence.card_present();
        status.presence.event_state = state;
        let present = status.presence.card_present();
        drop(status);

        match (was_present, present) {
            (false, true) => {
                debug!(?state, "Card inserted");
                self.handle.emit(SessionEvent::CardInserted);
            }
            (true, false) => {
                debug!(?state, "Card removed");
                self.handle.emit(SessionEvent::CardRemoved);
            }
            _ => {}
        }
    }

    /// Cache the information block of the reader
    pub fn set_reader_info(&self, info: ReaderInfo) {
        self.handle.shared().status.lock().presence.reader_info = Some(info);
    }

    /// Forget the reader and everything observed through it
    pub fn reset_reader_state(&self) {
        let mut status = self.handle.shared().status.lock();
        let had_card = status.presence.card_present();
        status.presence = PresenceState::default();
        drop(status);

        if had_card {
            self.handle.emit(SessionEvent::CardRemoved);
        }
    }

    /// Clear the observable card fields
    pub fn reset_card_state(&self) {
        let mut status = self.handle.shared().status.lock();
        status.card_ready = false;
        status.user_record = Default::default();
        status.pin_retries = 0;
    }
}
