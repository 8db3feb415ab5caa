//! Session event broadcasting

use crossbeam_channel::{Receiver, Sender, unbounded};
use memcard_apdu_core::UserRecord;
use parking_lot::Mutex;

use crate::state::State;

/// Something observable happened in the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A reader was detected
    ReaderAttached(String),
    /// The reader went away
    ReaderDetached,
    /// A card was inserted
    CardInserted,
    /// The card was removed
    CardRemoved,
    /// An initialized card was read
    CardReady(UserRecord),
    /// The user record was written to the card
    CardUpdated(UserRecord),
    /// The session entered the error state
    CardError,
    /// The state machine moved to another state
    StateChanged {
        /// Previous state
        from: State,
        /// New state
        to: State,
    },
}

/// Fan-out of session events to any number of subscribers
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    /// Register a new subscriber
    pub(crate) fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send an event to all subscribers, dropping those that hung up
    pub(crate) fn emit(&self, event: SessionEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out() {
        let bus = EventBus::default();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.emit(SessionEvent::CardInserted);
        assert_eq!(first.try_recv().unwrap(), SessionEvent::CardInserted);
        assert_eq!(second.try_recv().unwrap(), SessionEvent::CardInserted);
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let bus = EventBus::default();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(SessionEvent::ReaderDetached);
        assert_eq!(bus.subscribers.lock().len(), 1);
        assert_eq!(kept.try_recv().unwrap(), SessionEvent::ReaderDetached);
    }
}
