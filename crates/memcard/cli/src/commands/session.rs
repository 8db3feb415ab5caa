use std::error::Error;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use memcard_session::{SessionConfig, SessionEvent, SessionManager};
use tracing::info;

use crate::utils::display;

/// Wait for the next event matching `want`, failing on a card error or once `deadline` passes
fn wait_for_event(
    events: &Receiver<SessionEvent>,
    deadline: Instant,
    mut want: impl FnMut(&SessionEvent) -> bool,
) -> Result<SessionEvent, Box<dyn Error>> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if want(&event) => return Ok(event),
            Ok(SessionEvent::CardError) => return Err("Card rejected the PIN or the write".into()),
            Ok(event) => info!(?event, "Session event"),
            Err(RecvTimeoutError::Timeout) => return Err("Timed out waiting for a card".into()),
            Err(RecvTimeoutError::Disconnected) => return Err("Session stopped".into()),
        }
    }
}

fn start_session(config: SessionConfig) -> Result<(SessionManager, Receiver<SessionEvent>), Box<dyn Error>> {
    let mut manager = SessionManager::new(config);
    let events = manager.subscribe();
    manager.start()?;
    println!("{}", display::info("Waiting for a card..."));
    Ok((manager, events))
}

/// Wait for a card and print its record
pub fn status_command(config: SessionConfig, timeout: Duration) -> Result<(), Box<dyn Error>> {
    let (mut manager, events) = start_session(config)?;
    wait_for_event(&events, Instant::now() + timeout, |event| {
        matches!(event, SessionEvent::CardReady(_))
    })?;

    let snapshot = manager.snapshot();
    let mut items = vec![("Reader", snapshot.presence.reader_name.clone())];
    if let Some(info) = &snapshot.presence.reader_info {
        items.push(("Firmware", info.firmware.clone()));
    }
    items.extend(display::record_items(&snapshot.user_record));
    items.push(("PIN retries", snapshot.pin_retries.to_string()));
    println!("{}", display::key_value_box("Card status", items));

    manager.stop();
    Ok(())
}

/// Print session events until `duration` elapses, or forever
pub fn watch_command(config: SessionConfig, duration: Option<Duration>) -> Result<(), Box<dyn Error>> {
    let (mut manager, events) = start_session(config)?;
    let deadline = duration.map(|d| Instant::now() + d);

    loop {
        let event = match deadline {
            Some(deadline) => {
                match events.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return Err("Session stopped".into()),
                }
            }
            None => events.recv()?,
        };
        println!("{}", display::event(&event));
    }

    manager.stop();
    Ok(())
}

/// Request an update for the next ready card and wait for it to be written
pub fn update_command(
    config: SessionConfig,
    value: u32,
    target_id: u32,
    timeout: Duration,
) -> Result<(), Box<dyn Error>> {
    let (mut manager, events) = start_session(config)?;
    let deadline = Instant::now() + timeout;

    wait_for_event(&events, deadline, |event| {
        matches!(event, SessionEvent::CardReady(_))
    })?;
    manager.request_update(value, target_id);

    let SessionEvent::CardUpdated(record) = wait_for_event(&events, deadline, |event| {
        matches!(event, SessionEvent::CardUpdated(_))
    })?
    else {
        return Err("Unexpected session event".into());
    };

    println!("{}", display::success("Card updated"));
    println!(
        "{}",
        display::key_value_box("Record", display::record_items(&record).collect())
    );

    manager.stop();
    Ok(())
}
