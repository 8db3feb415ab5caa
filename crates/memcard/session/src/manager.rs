//! Session lifecycle: a dedicated thread owning the reader context

use std::ops::Deref;
use std::thread::{self, JoinHandle};

use crossbeam_channel::bounded;
use memcard_apdu_core::TransportError;
use memcard_apdu_transport_pcsc::{PcscConfig, PcscContext, ReaderContext};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::handle::{SessionHandle, SessionSnapshot};
use crate::machine::CardSession;

/// Name of the session thread
pub const THREAD_NAME: &str = "memcard-session";

/// Runs a [`CardSession`] on its own thread
///
/// The reader context is created on the session thread and released when it exits.
/// Observers use the [`SessionHandle`] the manager dereferences to.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    pcsc: PcscConfig,
    handle: SessionHandle,
    thread: Option<JoinHandle<()>>,
}

impl SessionManager {
    /// Create a stopped manager
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            pcsc: PcscConfig::default(),
            handle: SessionHandle::new(),
            thread: None,
        }
    }

    /// Set the PC/SC connection options
    pub const fn with_pcsc_config(mut self, pcsc: PcscConfig) -> Self {
        self.pcsc = pcsc;
        self
    }

    /// Get the session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a handle that outlives the manager's borrow
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Start the session on the system PC/SC service
    pub fn start(&mut self) -> Result<()> {
        let pcsc = self.pcsc;
        self.start_with(move || PcscContext::establish_with_config(pcsc).map_err(TransportError::from))
    }

    /// Start the session on a context built by `factory` on the session thread
    ///
    /// Returns once the context is established. A context failure is reported here and
    /// leaves the manager stopped.
    pub fn start_with<C, F>(&mut self, factory: F) -> Result<()>
    where
        C: ReaderContext + 'static,
        F: FnOnce() -> std::result::Result<C, TransportError> + Send + 'static,
    {
        if self.thread.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = bounded(1);
        let config = self.config.clone();
        let handle = self.handle.clone();
        handle.set_running(true);

        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let context = match factory() {
                    Ok(context) => context,
                    Err(e) => {
                        error!(error = %e, "Failed to establish reader context");
                        handle.set_running(false);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut session = CardSession::with_handle(context, config, handle);
                let _ = ready_tx.send(Ok(()));
                session.run();
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.handle.set_running(false);
                return Err(Error::Spawn(e));
            }
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Session thread started");
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(Error::Transport(e))
            }
            Err(_) => {
                self.handle.set_running(false);
                let _ = thread.join();
                Err(Error::Transport(TransportError::other(
                    "session thread exited during startup",
                )))
            }
        }
    }

    /// Check whether the session thread is running
    pub const fn is_started(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the session: clear the running flag, cancel any blocking wait, join the thread
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        debug!("Stopping session thread");
        self.handle.set_running(false);
        self.handle.cancel_wait();

        if thread.join().is_err() {
            warn!("Session thread panicked");
        }
        *self.handle.shared().status.lock() = SessionSnapshot::default();
        info!("Session thread stopped");
    }
}

impl Deref for SessionManager {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}
