//! Simulated reader and SLE4442 card
//!
//! The simulation follows the PC/SC contract the session relies on: state-change waits
//! return only when the reported state differs from the caller's, cancellation wakes a
//! blocked wait (or the next one), and a card handle stops working once its card leaves.
#![allow(dead_code, unreachable_pub)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use memcard_apdu_core::{Bytes, CardTransport, TransportError, UserRecord};
use memcard_apdu_transport_pcsc::{CancelHandle, ReaderContext, ReaderStatus, State, StatusTarget};
use memcard_session::{APP_PIN, MAGIC, REGULAR_ID, USER_AREA_ADDRESS};
use parking_lot::{Condvar, Mutex};

/// Firmware string reported by the simulated reader
pub const FIRMWARE: &[u8; 10] = b"ACR38U-SIM";

/// Name of the simulated reader
pub const READER: &str = "ACS ACR38U 00 00";

/// Install a test log writer once
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or five seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Simulated SLE4442 card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCard {
    /// Main memory
    pub memory: Vec<u8>,
    /// Programmable security code
    pub pin: [u8; 3],
    /// Error counter (7, 3, 1, 0)
    pub retries: u8,
    /// Whether the PIN was presented in this power cycle
    pub unlocked: bool,
    /// Whether the reader accepts the card type
    pub supported: bool,
    /// Refuse every write with 69 82 even after the PIN was presented
    pub write_protected: bool,
}

impl SimCard {
    /// Factory-fresh card
    pub fn blank() -> Self {
        Self {
            memory: vec![0xFF; 256],
            pin: [0xFF; 3],
            retries: 7,
            unlocked: false,
            supported: true,
            write_protected: false,
        }
    }

    /// Card initialized by the application with `record`
    pub fn with_record(record: UserRecord) -> Self {
        let mut card = Self::blank();
        card.pin = *APP_PIN.as_bytes();
        card.set_record(record);
        card
    }

    /// Regular account with `value` as both value and total
    pub fn regular(value: u32) -> Self {
        Self::with_record(UserRecord::new(MAGIC, REGULAR_ID, value, value))
    }

    /// Card that rejects any further presentation
    pub fn locked(value: u32) -> Self {
        Self {
            retries: 0,
            ..Self::regular(value)
        }
    }

    /// Blank card whose factory PIN is not the usual `FF FF FF`
    pub fn blank_with_pin(pin: [u8; 3]) -> Self {
        Self {
            pin,
            ..Self::blank()
        }
    }

    /// Initialized card that refuses writes
    pub fn write_protected(value: u32) -> Self {
        Self {
            write_protected: true,
            ..Self::regular(value)
        }
    }

    /// Card the reader does not support
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::blank()
        }
    }

    /// Bytes of the user area
    pub fn user_area(&self) -> &[u8] {
        let start = USER_AREA_ADDRESS as usize;
        &self.memory[start..start + UserRecord::LEN]
    }

    /// Decoded user record
    pub fn record(&self) -> UserRecord {
        UserRecord::try_from(self.user_area()).unwrap()
    }

    /// Overwrite the user record
    pub fn set_record(&mut self, record: UserRecord) {
        let start = USER_AREA_ADDRESS as usize;
        self.memory[start..start + UserRecord::LEN].copy_from_slice(&record.to_bytes());
    }

    fn process(&mut self, apdu: &[u8]) -> Vec<u8> {
        let (ins, p2) = match apdu {
            [0xFF, ins, _, p2, ..] => (*ins, *p2),
            _ => return vec![0x6E, 0x00],
        };
        let body = &apdu[4..];

        match ins {
            0x09 => {
                let mut out = FIRMWARE.to_vec();
                out.extend_from_slice(&[0xFE, 0xFE, 0x00, 0x7F, 0x06, 0x01, 0x90, 0x00]);
                out
            }
            0xA4 if self.supported => vec![0x90, 0x00],
            0xA4 => vec![0x6A, 0x82],
            _ if !self.supported => vec![0x6A, 0x82],
            0xB0 => {
                let start = p2 as usize;
                let len = body.first().copied().unwrap_or(0) as usize;
                match self.memory.get(start..start + len) {
                    Some(data) => {
                        let mut out = data.to_vec();
                        out.extend_from_slice(&[0x90, 0x00]);
                        out
                    }
                    None => vec![0x6A, 0x86],
                }
            }
            0xB1 => {
                let echo = if self.unlocked { self.pin } else { [0; 3] };
                vec![self.retries, echo[0], echo[1], echo[2], 0x90, 0x00]
            }
            0x20 => {
                if self.retries == 0 {
                    return vec![0x90, 0x00];
                }
                if body.get(1..4) == Some(&self.pin[..]) {
                    self.retries = 7;
                    self.unlocked = true;
                } else {
                    self.retries >>= 1;
                }
                vec![0x90, self.retries]
            }
            0xD2 if self.unlocked => {
                self.pin.copy_from_slice(&body[1..4]);
                vec![0x90, 0x00]
            }
            0xD0 if self.unlocked && !self.write_protected => {
                let start = p2 as usize;
                let data = &body[1..];
                self.memory[start..start + data.len()].copy_from_slice(data);
                vec![0x90, 0x00]
            }
            0xD2 | 0xD0 => vec![0x69, 0x82],
            _ => vec![0x6D, 0x00],
        }
    }
}

#[derive(Debug, Default)]
struct World {
    reader: Option<String>,
    card: Option<SimCard>,
    /// Bumped on every reader arrival or departure
    reader_generation: u64,
    /// Card event counter, bumped on every card insertion or removal
    card_generation: u32,
    cancel_pending: bool,
    keep_power: bool,
    failing_connects: usize,
    open_handles: usize,
    connects: usize,
    commands: Vec<Vec<u8>>,
}

impl World {
    fn card_state(&self) -> State {
        if self.card.is_some() {
            State::PRESENT
        } else {
            State::EMPTY
        }
    }
}

#[derive(Debug, Default)]
struct Sim {
    world: Mutex<World>,
    changed: Condvar,
}

/// Handle on the simulated reader, shared by the test and the session
#[derive(Debug, Clone, Default)]
pub struct SimReader {
    sim: Arc<Sim>,
}

impl SimReader {
    /// Simulation with no reader attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation with the reader attached and `card` inserted
    pub fn with_card(card: SimCard) -> Self {
        let reader = Self::new();
        reader.attach_reader();
        reader.insert_card(card);
        reader
    }

    /// Reader context for a session
    pub fn context(&self) -> SimContext {
        SimContext {
            sim: Arc::clone(&self.sim),
        }
    }

    fn update(&self, f: impl FnOnce(&mut World)) {
        let mut world = self.sim.world.lock();
        f(&mut world);
        self.sim.changed.notify_all();
    }

    /// Plug in the reader
    pub fn attach_reader(&self) {
        self.update(|world| {
            world.reader = Some(READER.to_string());
            world.reader_generation += 1;
        });
    }

    /// Unplug the reader, taking any card with it
    pub fn detach_reader(&self) {
        self.update(|world| {
            world.reader = None;
            world.reader_generation += 1;
            if world.card.take().is_some() {
                world.card_generation += 1;
            }
        });
    }

    /// Insert a card
    pub fn insert_card(&self, card: SimCard) {
        self.update(|world| {
            world.card = Some(card);
            world.card_generation += 1;
        });
    }

    /// Pull the card, returning its final contents
    pub fn remove_card(&self) -> Option<SimCard> {
        let mut removed = None;
        self.update(|world| {
            removed = world.card.take();
            world.card_generation += 1;
        });
        removed
    }

    /// Make the next connect fail as if the card left right after the probe
    pub fn fail_next_connect(&self) {
        self.update(|world| world.failing_connects += 1);
    }

    /// Pull the card and put `card` in its place while nobody watches
    pub fn swap_card(&self, card: SimCard) {
        self.update(|world| {
            world.card = Some(card);
            world.card_generation += 2;
        });
    }

    /// Leave the card powered on disconnect, keeping it unlocked
    pub fn keep_power(&self, keep: bool) {
        self.update(|world| world.keep_power = keep);
    }

    /// Current contents of the inserted card
    pub fn card(&self) -> Option<SimCard> {
        self.sim.world.lock().card.clone()
    }

    /// Number of connected card handles
    pub fn open_handles(&self) -> usize {
        self.sim.world.lock().open_handles
    }

    /// Number of successful connects so far
    pub fn connects(&self) -> usize {
        self.sim.world.lock().connects
    }

    /// Commands received with the given instruction byte
    pub fn count(&self, ins: u8) -> usize {
        self.sim
            .world
            .lock()
            .commands
            .iter()
            .filter(|apdu| apdu.get(1) == Some(&ins))
            .count()
    }
}

/// Simulated [`ReaderContext`]
#[derive(Debug)]
pub struct SimContext {
    sim: Arc<Sim>,
}

impl ReaderContext for SimContext {
    type Card = SimHandle;
    type Canceller = SimCanceller;

    fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.sim.world.lock().reader.iter().cloned().collect())
    }

    fn get_status_change(
        &self,
        target: StatusTarget<'_>,
        current: ReaderStatus,
        timeout: Option<Duration>,
    ) -> Result<ReaderStatus, TransportError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut world = self.sim.world.lock();

        if let StatusTarget::Reader(name) = target {
            if world.reader.as_deref() != Some(name) {
                return Err(TransportError::Connection);
            }
        }
        let reader_generation = world.reader_generation;

        loop {
            if world.cancel_pending {
                world.cancel_pending = false;
                return Err(TransportError::Cancelled);
            }

            match target {
                StatusTarget::Pnp => {
                    let attached = world.reader.is_some();
                    if attached != current.state().contains(State::PRESENT)
                        || world.reader_generation != reader_generation
                    {
                        return Ok(ReaderStatus::new(State::CHANGED, 0));
                    }
                }
                StatusTarget::Reader(name) => {
                    let count = world.card_generation;
                    if world.reader.as_deref() != Some(name) {
                        return Ok(ReaderStatus::new(State::UNKNOWN | State::CHANGED, count));
                    }
                    // like pcsc-lite, a differing event counter counts as a change
                    if current == ReaderStatus::UNAWARE
                        || current.card_present() != world.card.is_some()
                        || current.event_count() != count
                    {
                        return Ok(ReaderStatus::new(world.card_state() | State::CHANGED, count));
                    }
                }
            }

            match deadline {
                Some(deadline) => {
                    if self.sim.changed.wait_until(&mut world, deadline).timed_out() {
                        return Err(TransportError::Timeout);
                    }
                }
                None => self.sim.changed.wait(&mut world),
            }
        }
    }

    fn connect(&self, reader: &str) -> Result<SimHandle, TransportError> {
        let mut world = self.sim.world.lock();
        if world.reader.as_deref() != Some(reader) {
            return Err(TransportError::Connection);
        }
        if world.failing_connects > 0 {
            world.failing_connects -= 1;
            return Err(TransportError::NoCard);
        }
        let keep_power = world.keep_power;
        let Some(card) = world.card.as_mut() else {
            return Err(TransportError::NoCard);
        };
        if !keep_power {
            card.unlocked = false;
        }
        world.open_handles += 1;
        world.connects += 1;

        Ok(SimHandle {
            sim: Arc::clone(&self.sim),
            card_generation: world.card_generation,
            connected: true,
        })
    }

    fn canceller(&self) -> SimCanceller {
        SimCanceller {
            sim: Arc::clone(&self.sim),
        }
    }
}

/// Simulated [`CancelHandle`]
#[derive(Debug)]
pub struct SimCanceller {
    sim: Arc<Sim>,
}

impl CancelHandle for SimCanceller {
    fn cancel(&self) -> Result<(), TransportError> {
        self.sim.world.lock().cancel_pending = true;
        self.sim.changed.notify_all();
        Ok(())
    }
}

/// Simulated connected card
#[derive(Debug)]
pub struct SimHandle {
    sim: Arc<Sim>,
    card_generation: u32,
    connected: bool,
}

impl CardTransport for SimHandle {
    fn do_transmit_raw(&mut self, command: &[u8], _max_response: usize) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::NoCard);
        }

        let mut world = self.sim.world.lock();
        if world.card_generation != self.card_generation {
            return Err(TransportError::NoCard);
        }
        world.commands.push(command.to_vec());
        let card = world.card.as_mut().ok_or(TransportError::NoCard)?;
        Ok(Bytes::from(card.process(command)))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;

        let mut world = self.sim.world.lock();
        world.open_handles -= 1;
        let keep_power = world.keep_power;
        if world.card_generation == self.card_generation && !keep_power {
            if let Some(card) = world.card.as_mut() {
                card.unlocked = false;
            }
        }
        Ok(())
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
