//! Display utilities for the memcard CLI

use colored::Colorize;
use memcard_apdu_core::UserRecord;
use memcard_session::SessionEvent;
use std::fmt::Display;

/// A formatted section title
pub struct SectionTitle(pub &'static str);

impl Display for SectionTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\n{}", self.0.bold().underline())
    }
}

/// Format a section header
pub fn section_title(title: &'static str) -> SectionTitle {
    SectionTitle(title)
}

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format an info message
pub fn info(message: &str) -> String {
    format!("ℹ️  {}", message.blue())
}

/// Format a key-value section for important outputs
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

/// Key-value rows for a user record
pub fn record_items(record: &UserRecord) -> impl Iterator<Item = (&'static str, String)> {
    [
        ("Magic", format!("{:#010x}", record.magic)),
        ("Id", format!("{:#x}", record.id)),
        ("Value", record.value.to_string()),
        ("Total", record.total.to_string()),
    ]
    .into_iter()
}

/// One line describing a session event
pub fn event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::ReaderAttached(name) => format!("{} {}", "reader attached".green(), name),
        SessionEvent::ReaderDetached => "reader detached".yellow().to_string(),
        SessionEvent::CardInserted => "card inserted".green().to_string(),
        SessionEvent::CardRemoved => "card removed".yellow().to_string(),
        SessionEvent::CardReady(record) => format!("{} {}", "card ready".green().bold(), record),
        SessionEvent::CardUpdated(record) => format!("{} {}", "card updated".green().bold(), record),
        SessionEvent::CardError => "card error".red().bold().to_string(),
        SessionEvent::StateChanged { from, to } => format!("{from} -> {to}").dimmed().to_string(),
    }
}
