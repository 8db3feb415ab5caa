//! State shared between the session thread and its observers

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;
use memcard_apdu_core::{ReaderInfo, UserRecord};
use memcard_apdu_transport_pcsc::CancelHandle;
use parking_lot::Mutex;
use tracing::debug;

use crate::events::{EventBus, SessionEvent};
use crate::presence::PresenceState;
use crate::state::State;

/// Request to change the value of the account on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Amount added to a regular account; ignored for other ids
    pub value: u32,
    /// Account id the card is written with
    pub target_id: u32,
}

/// Everything an observer can see of the session, captured under one lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Reader and card presence
    pub presence: PresenceState,
    /// Current state of the machine
    pub state: State,
    /// Whether the session holds a card handle
    pub card_connected: bool,
    /// Whether an initialized card was read
    pub card_ready: bool,
    /// Last user record read from or written to the card
    pub user_record: UserRecord,
    /// Last observed PIN retry counter
    pub pin_retries: u8,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            presence: PresenceState::default(),
            state: State::Initial,
            card_connected: false,
            card_ready: false,
            user_record: UserRecord::default(),
            pin_retries: 0,
        }
    }
}

#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) status: Mutex<SessionSnapshot>,
    pub(crate) pending: Mutex<Option<UpdateRequest>>,
    pub(crate) running: AtomicBool,
    pub(crate) canceller: Mutex<Option<Box<dyn CancelHandle>>>,
    pub(crate) events: EventBus,
}

/// Cloneable view on a running card session
///
/// All accessors read the snapshot the session thread publishes after every step.
#[derive(Clone, Default)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &*self.shared.status.lock())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Check whether a reader is attached
    pub fn reader_attached(&self) -> bool {
        self.shared.status.lock().presence.reader_present()
    }

    /// Check whether a card is in the reader
    pub fn card_inserted(&self) -> bool {
        self.shared.status.lock().presence.card_present()
    }

    /// Name of the attached reader, empty if there is none
    pub fn reader_name(&self) -> String {
        self.shared.status.lock().presence.reader_name.clone()
    }

    /// Information block of the attached reader, once a card was identified
    pub fn reader_info(&self) -> Option<ReaderInfo> {
        self.shared.status.lock().presence.reader_info.clone()
    }

    /// Check whether the session holds a card handle
    pub fn card_connected(&self) -> bool {
        self.shared.status.lock().card_connected
    }

    /// Check whether an initialized card was read and is still connected
    pub fn card_ready(&self) -> bool {
        self.shared.status.lock().card_ready
    }

    /// Last user record read from or written to the card
    pub fn user_record(&self) -> UserRecord {
        self.shared.status.lock().user_record
    }

    /// Last observed PIN retry counter
    pub fn pin_retries(&self) -> u8 {
        self.shared.status.lock().pin_retries
    }

    /// Current state of the machine
    pub fn state(&self) -> State {
        self.shared.status.lock().state
    }

    /// Capture all observable fields at once
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.status.lock().clone()
    }

    /// Receive session events from now on
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Check whether the session loop should keep going
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Schedule an update of the card record and wake the session
    ///
    /// Returns immediately. A later request replaces one that was not consumed yet.
    pub fn request_update(&self, value: u32, target_id: u32) {
        *self.shared.pending.lock() = Some(UpdateRequest { value, target_id });
        debug!(value, target_id, "Update requested");
        self.cancel_wait();
    }

    /// Check whether an update request is waiting to be consumed
    pub fn update_pending(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    pub(crate) fn take_update(&self) -> Option<UpdateRequest> {
        self.shared.pending.lock().take()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.shared.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        self.shared.events.emit(event);
    }

    /// Wake the session thread out of a blocking wait
    pub(crate) fn cancel_wait(&self) {
        if let Some(canceller) = self.shared.canceller.lock().as_ref() {
            if let Err(e) = canceller.cancel() {
                debug!(error = %e, "Failed to cancel wait");
            }
        }
    }
}
