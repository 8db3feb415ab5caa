//! Reader context: enumeration, state-change waits, cancellation and connect

use std::ffi::CString;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use memcard_apdu_core::{CardTransport, TransportError};
use pcsc::{Context, ReaderState, Scope, State};
use tracing::{debug, trace};

use crate::config::PcscConfig;
use crate::error::{PcscError, transport_error};
use crate::reader::PcscReader;
use crate::status::ReaderStatus;
use crate::transport::PcscCard;

/// Upper bound on one blocking `SCardGetStatusChange` call
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// What a state-change wait watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget<'a> {
    /// Reader arrival and departure
    Pnp,
    /// Card presence in the named reader
    Reader(&'a str),
}

/// Handle that aborts a blocking state-change wait from another thread
pub trait CancelHandle: Send + Sync + fmt::Debug {
    /// Make the in-progress [`ReaderContext::get_status_change`] return
    /// [`TransportError::Cancelled`]
    ///
    /// A cancel issued while no wait is in progress makes the next wait return
    /// [`TransportError::Cancelled`] immediately.
    fn cancel(&self) -> Result<(), TransportError>;
}

/// Reader-side primitives a card session is built on
///
/// A context is owned by one thread for its whole lifetime. Only the
/// [`CancelHandle`] obtained from [`ReaderContext::canceller`] crosses threads.
pub trait ReaderContext {
    /// Connected card handle
    type Card: CardTransport + 'static;

    /// Cross-thread cancellation handle
    type Canceller: CancelHandle + 'static;

    /// Names of the attached readers; empty if there are none
    fn list_readers(&self) -> Result<Vec<String>, TransportError>;

    /// Block until the state of `target` differs from `current`
    ///
    /// The wait is edge-triggered: passing the status returned by the previous call,
    /// event counter included, makes the next call return only on a real change. `None`
    /// waits forever. Expiry returns [`TransportError::Timeout`], cancellation returns
    /// [`TransportError::Cancelled`].
    fn get_status_change(
        &self,
        target: StatusTarget<'_>,
        current: ReaderStatus,
        timeout: Option<Duration>,
    ) -> Result<ReaderStatus, TransportError>;

    /// Connect the card in the named reader
    fn connect(&self, reader: &str) -> Result<Self::Card, TransportError>;

    /// Get a handle that cancels waits on this context
    fn canceller(&self) -> Self::Canceller;
}

/// [`CancelHandle`] for a PC/SC context
#[derive(Clone)]
pub struct PcscCanceller {
    context: Context,
    pending: Arc<AtomicBool>,
}

impl fmt::Debug for PcscCanceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscCanceller")
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish()
    }
}

impl CancelHandle for PcscCanceller {
    fn cancel(&self) -> Result<(), TransportError> {
        // SCardCancel only affects a wait that is already blocking
        self.pending.store(true, Ordering::SeqCst);
        self.context.cancel().map_err(transport_error)
    }
}

/// [`ReaderContext`] backed by the system PC/SC service
pub struct PcscContext {
    /// PC/SC context
    context: Context,
    /// Connection options
    config: PcscConfig,
    /// Cancel requested and not yet delivered to a wait
    cancel_pending: Arc<AtomicBool>,
}

impl fmt::Debug for PcscContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscContext {
    /// Establish a user-scope context with the default configuration
    pub fn establish() -> Result<Self, PcscError> {
        Self::establish_with_config(PcscConfig::default())
    }

    /// Establish a user-scope context with a custom configuration
    pub fn establish_with_config(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        debug!("Established PC/SC context");
        Ok(Self {
            context,
            config,
            cancel_pending: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the connection options
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// List attached readers together with their card presence
    pub fn readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let names = match self.context.list_readers_owned() {
            Ok(names) => names,
            Err(pcsc::Error::NoReadersAvailable) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut result = Vec::with_capacity(names.len());
        for name in names {
            let mut states = [ReaderState::new(name.clone(), State::UNAWARE)];
            match self
                .context
                .get_status_change(Some(Duration::ZERO), &mut states)
            {
                Ok(()) => result.push(PcscReader::from_reader_state(&states[0])),
                Err(_) => result.push(PcscReader::new(
                    name.to_string_lossy().into_owned(),
                    false,
                    None,
                )),
            }
        }

        Ok(result)
    }
}

/// Run `wait` in slices of at most [`WAIT_SLICE`] until it reports something other than
/// a slice timeout, the overall `timeout` expires or a cancel is pending
///
/// `SCardCancel` only reaches a call already blocking. A cancel stored in `pending` just
/// before a slice starts is picked up when that slice ends.
fn sliced_wait<T>(
    pending: &AtomicBool,
    timeout: Option<Duration>,
    mut wait: impl FnMut(Duration) -> Result<T, TransportError>,
) -> Result<T, TransportError> {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);

    loop {
        if pending.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Cancelled);
        }

        let slice = match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(WAIT_SLICE),
            None => WAIT_SLICE,
        };

        match wait(slice) {
            Err(TransportError::Timeout)
                if deadline.is_none_or(|deadline| Instant::now() < deadline) => {}
            Err(TransportError::Cancelled) => {
                pending.store(false, Ordering::SeqCst);
                return Err(TransportError::Cancelled);
            }
            result => return result,
        }
    }
}

fn reader_cstring(reader: &str) -> Result<CString, PcscError> {
    CString::new(reader).map_err(|_| PcscError::InvalidReaderName(reader.to_string()))
}

impl ReaderContext for PcscContext {
    type Card = PcscCard;
    type Canceller = PcscCanceller;

    fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        match self.context.list_readers_owned() {
            Ok(names) => Ok(names
                .into_iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(transport_error(e)),
        }
    }

    fn get_status_change(
        &self,
        target: StatusTarget<'_>,
        current: ReaderStatus,
        timeout: Option<Duration>,
    ) -> Result<ReaderStatus, TransportError> {
        let name = match target {
            StatusTarget::Pnp => CString::from(pcsc::PNP_NOTIFICATION()),
            StatusTarget::Reader(reader) => reader_cstring(reader)?,
        };

        trace!(watched = ?target, ?current, ?timeout, "Waiting for status change");
        let mut states = [ReaderState::new(name, current.baseline())];
        sliced_wait(&self.cancel_pending, timeout, |slice| {
            self.context
                .get_status_change(Some(slice), &mut states)
                .map_err(transport_error)
        })?;

        let event = ReaderStatus::from_reader_state(&states[0]);
        trace!(watched = ?target, ?event, "Status changed");
        Ok(event)
    }

    fn connect(&self, reader: &str) -> Result<PcscCard, TransportError> {
        let name = reader_cstring(reader)?;
        let card = self
            .context
            .connect(&name, self.config.share_mode.into(), self.config.protocols)
            .map_err(|e| match e {
                pcsc::Error::NoSmartcard => PcscError::NoCard(reader.to_string()),
                e => PcscError::Pcsc(e),
            })?;

        debug!(reader, "Connected to card");
        Ok(PcscCard::new(card, reader, self.config.disposition))
    }

    fn canceller(&self) -> PcscCanceller {
        PcscCanceller {
            context: self.context.clone(),
            pending: Arc::clone(&self.cancel_pending),
        }
    }
}
