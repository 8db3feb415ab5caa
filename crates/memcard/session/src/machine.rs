//! Card session state machine
//!
//! [`CardSession`] owns the reader context and at most one connected card. Each call to
//! [`CardSession::step`] runs one state and returns the next one. Blocking happens only in
//! `CHECK_CARD`, `WAIT_READER`, `WAIT_CARD`, `WAIT_USER` and the `ERROR` pause.

use std::fmt;
use std::thread;

use memcard_apdu_core::{CardTransport, MemoryCard, TransportError, UserRecord};
use memcard_apdu_transport_pcsc::ReaderContext;
use tracing::{debug, info, info_span, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::handle::{SessionHandle, UpdateRequest};
use crate::presence::PresenceTracker;
use crate::state::State;

/// Session state machine running against a reader context
pub struct CardSession<C: ReaderContext> {
    context: C,
    config: SessionConfig,
    handle: SessionHandle,
    tracker: PresenceTracker,
    /// Connected card, only in the connected states
    card: Option<C::Card>,
    pin_retries: u8,
    pin_echo: [u8; 3],
    record: UserRecord,
    card_ready: bool,
    /// Update consumed in `WAIT_USER`, applied in `UPDATE`
    update: Option<UpdateRequest>,
    steps: u64,
}

impl<C: ReaderContext> fmt::Debug for CardSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSession")
            .field("config", &self.config)
            .field("card", &self.card)
            .field("pin_retries", &self.pin_retries)
            .field("record", &self.record)
            .field("card_ready", &self.card_ready)
            .field("update", &self.update)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl<C: ReaderContext> CardSession<C> {
    /// Create a session with its own handle, ready to be stepped
    pub fn new(context: C, config: SessionConfig) -> Self {
        let handle = SessionHandle::new();
        handle.set_running(true);
        Self::with_handle(context, config, handle)
    }

    pub(crate) fn with_handle(context: C, config: SessionConfig, handle: SessionHandle) -> Self {
        *handle.shared().canceller.lock() = Some(Box::new(context.canceller()));

        Self {
            context,
            config,
            tracker: PresenceTracker::new(handle.clone()),
            handle,
            card: None,
            pin_retries: 0,
            pin_echo: [0; 3],
            record: UserRecord::default(),
            card_ready: false,
            update: None,
            steps: 0,
        }
    }

    /// Get a handle observing this session
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Get the reader context
    pub const fn context(&self) -> &C {
        &self.context
    }

    /// Step the machine until the handle stops running, then release the card
    pub fn run(&mut self) {
        let span = info_span!("session");
        let _enter = span.enter();
        info!("Session started");

        let mut state = State::Initial;
        self.publish(state);
        while self.handle.is_running() {
            state = self.step(state);
        }

        self.release();
        self.publish(State::Initial);
        info!(steps = self.steps, "Session stopped");
    }

    /// Run one state and return the next one
    pub fn step(&mut self, state: State) -> State {
        let next = match state {
            State::Initial => self.initial(),
            State::CheckReader => self.check_reader(),
            State::WaitReader => self.wait_reader(),
            State::CheckCard => self.check_card(),
            State::WaitCard => self.wait_card(),
            State::Connect => self.connect(),
            State::Identify => self.identify(),
            State::Read => self.read(),
            State::SetPin => self.set_pin(),
            State::PresentPin => self.present_pin(),
            State::WaitUser => self.wait_user(),
            State::Update => self.update(),
            State::Disconnect => self.disconnect(),
            State::Error => self.error(),
        };

        self.steps += 1;
        if next != state {
            debug!(step = self.steps, from = %state, to = %next, "State transition");
            self.handle.emit(SessionEvent::StateChanged {
                from: state,
                to: next,
            });
        }
        if next == State::Error && state != State::Error {
            self.handle.emit(SessionEvent::CardError);
        }

        self.publish(next);
        next
    }

    fn initial(&mut self) -> State {
        self.tracker.detect_reader(&self.context);
        State::CheckReader
    }

    fn check_reader(&mut self) -> State {
        if self.tracker.reader_present() {
            State::CheckCard
        } else {
            self.tracker.reset_reader_state();
            self.tracker.reset_card_state();
            State::WaitReader
        }
    }

    fn wait_reader(&mut self) -> State {
        let result = self
            .tracker
            .wait_for_reader(&self.context, self.config.reader_timeout());
        self.after_wait("reader", result);
        State::Initial
    }

    fn check_card(&mut self) -> State {
        match self
            .tracker
            .probe_card(&self.context, self.config.probe_timeout())
        {
            Ok(true) => State::Connect,
            Ok(false) => {
                self.tracker.reset_card_state();
                State::WaitCard
            }
            Err(e) => {
                debug!(error = %e, "Card probe failed");
                State::Initial
            }
        }
    }

    fn wait_card(&mut self) -> State {
        let result = self
            .tracker
            .wait_for_card(&self.context, self.config.card_timeout())
            .map(drop);
        self.after_wait("card", result);
        State::Initial
    }

    fn after_wait(&self, what: &str, result: std::result::Result<(), TransportError>) {
        match result {
            Ok(()) => debug!(what, "Presence changed"),
            Err(TransportError::Timeout) => trace!(what, "Wait timed out"),
            Err(TransportError::Cancelled) => debug!(what, "Wait cancelled"),
            Err(e) => {
                debug!(what, error = %e, "Wait failed");
                // keep a broken context from spinning the loop
                thread::sleep(self.config.error_delay());
            }
        }
    }

    fn connect(&mut self) -> State {
        let reader = self.tracker.reader_name();
        match self.context.connect(&reader) {
            Ok(card) => {
                debug!(%reader, "Card connected");
                self.card = Some(card);
                State::Identify
            }
            Err(e) => {
                debug!(%reader, error = %e, "Failed to connect card");
                State::Initial
            }
        }
    }

    fn memory_card(&mut self) -> Result<MemoryCard<'_, C::Card>> {
        let card = self.card.as_mut().ok_or(TransportError::NoCard)?;
        Ok(MemoryCard::new(card))
    }

    fn identify(&mut self) -> State {
        match self.identify_card() {
            Ok(()) => State::Read,
            Err(e) => {
                debug!(error = %e, "Failed to identify card");
                State::Disconnect
            }
        }
    }

    fn identify_card(&mut self) -> Result<()> {
        let mut card = self.memory_card()?;
        let info = card.reader_info()?;
        card.select_card_type()?;
        let counter = card.error_counter()?;

        self.tracker.set_reader_info(info);
        self.pin_retries = counter.retries;
        self.pin_echo = counter.pin_echo;
        debug!(retries = counter.retries, "Card identified");
        Ok(())
    }

    fn read(&mut self) -> State {
        let address = self.config.user_area_address;
        let record = match self
            .memory_card()
            .and_then(|mut card| card.read_user_record(address).map_err(Error::from))
        {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Failed to read user record");
                return State::Disconnect;
            }
        };

        self.record = record;
        if record.is_blank() {
            info!("Blank card");
            State::SetPin
        } else {
            self.card_ready = true;
            info!(%record, "Card ready");
            self.handle.emit(SessionEvent::CardReady(record));
            State::PresentPin
        }
    }

    fn set_pin(&mut self) -> State {
        match self.initialize_card() {
            Ok(()) => {
                self.record = UserRecord::new(self.config.magic, self.config.regular_id, 0, 0);
                State::Update
            }
            Err(e) => {
                if let Some(retries) = rejected_retries(&e) {
                    self.pin_retries = retries;
                }
                warn!(error = %e, retries = self.pin_retries, "Failed to initialize blank card");
                State::Error
            }
        }
    }

    fn initialize_card(&mut self) -> Result<()> {
        let default_pin = self.config.default_pin();
        let pin = self.config.pin();

        let mut card = self.memory_card()?;
        card.present_pin(&default_pin)?;
        let counter = card.error_counter()?;
        card.change_pin(&pin)?;

        self.pin_retries = counter.retries;
        self.pin_echo = counter.pin_echo;
        Ok(())
    }

    fn present_pin(&mut self) -> State {
        let pin = self.config.pin();
        if self.pin_echo == *pin.as_bytes() {
            debug!("PIN already presented");
            return State::WaitUser;
        }

        match self.unlock_card() {
            Ok(()) => {
                debug!(retries = self.pin_retries, "PIN accepted");
                State::WaitUser
            }
            Err(e) => {
                if let Some(retries) = rejected_retries(&e) {
                    self.pin_retries = retries;
                }
                warn!(error = %e, retries = self.pin_retries, "PIN presentation failed");
                State::Error
            }
        }
    }

    fn unlock_card(&mut self) -> Result<()> {
        let pin = self.config.pin();
        let mut card = self.memory_card()?;
        card.present_pin(&pin)?;
        let counter = card.error_counter()?;

        self.pin_retries = counter.retries;
        self.pin_echo = counter.pin_echo;
        Ok(())
    }

    fn wait_user(&mut self) -> State {
        if let Some(request) = self.handle.take_update() {
            self.update = Some(request);
            return State::Update;
        }

        match self.tracker.wait_for_card(&self.context, None) {
            Err(TransportError::Timeout) => State::WaitUser,
            Err(TransportError::Cancelled) => match self.handle.take_update() {
                Some(request) => {
                    self.update = Some(request);
                    State::Update
                }
                None => State::Disconnect,
            },
            Ok(state) => {
                debug!(?state, "Card state changed");
                State::Disconnect
            }
            Err(e) => {
                debug!(error = %e, "Card wait failed");
                State::Disconnect
            }
        }
    }

    /// Record to write for `request`; a blank-card initialization passes `None`
    fn updated_record(&self, request: Option<UpdateRequest>) -> UserRecord {
        let mut record = self.record;
        if let Some(request) = request {
            if request.target_id == self.config.regular_id {
                record.id = self.config.regular_id;
                record.value = record.value.saturating_add(request.value);
            } else {
                record.id = request.target_id;
                record.value = 0;
            }
            record.total = record.value;
        }
        record.magic = self.config.magic;
        record
    }

    fn update(&mut self) -> State {
        let request = self.update.take();
        let record = self.updated_record(request);
        let address = self.config.user_area_address;

        match self
            .memory_card()
            .and_then(|mut card| card.write_user_record(address, &record).map_err(Error::from))
        {
            Ok(()) => {
                self.record = record;
                info!(%record, "Card updated");
                self.handle.emit(SessionEvent::CardUpdated(record));
                State::Disconnect
            }
            Err(e) => {
                warn!(error = %e, "Failed to write user record");
                State::Error
            }
        }
    }

    fn disconnect(&mut self) -> State {
        self.release();
        State::Initial
    }

    fn error(&mut self) -> State {
        match self
            .tracker
            .wait_for_card(&self.context, Some(self.config.error_delay()))
        {
            Ok(_) | Err(TransportError::Timeout) | Err(TransportError::Cancelled) => {}
            Err(e) => {
                debug!(error = %e, "Card check failed");
                self.tracker.reset_reader_state();
            }
        }

        if self.tracker.card_present() {
            trace!("Card still present");
            State::Error
        } else {
            info!("Card removed, leaving error state");
            self.release();
            State::Initial
        }
    }

    /// Disconnect the card if connected and clear the session fields
    fn release(&mut self) {
        if let Some(mut card) = self.card.take() {
            if let Err(e) = card.disconnect() {
                debug!(error = %e, "Card disconnect failed");
            }
        }

        self.pin_retries = 0;
        self.pin_echo = [0; 3];
        self.record = UserRecord::default();
        self.card_ready = false;
        self.update = None;
    }

    fn publish(&self, state: State) {
        let mut status = self.handle.shared().status.lock();
        status.state = state;
        status.card_connected = self.card.is_some();
        status.card_ready = self.card_ready;
        status.user_record = self.record;
        status.pin_retries = self.pin_retries;
    }
}

impl<C: ReaderContext> Drop for CardSession<C> {
    fn drop(&mut self) {
        self.release();
        *self.handle.shared().canceller.lock() = None;
    }
}

/// Retries left after a rejected presentation, carried in SW2 of a `90 0x` status
fn rejected_retries(error: &Error) -> Option<u8> {
    match error {
        Error::Apdu(e) => e
            .status_word()
            .filter(|sw| sw.is_code_presented())
            .map(|sw| sw.sw2),
        _ => None,
    }
}
