//! The per-run diagnostic capture channel.
//!
//! A `Console` is created fresh for every evaluation and buffers entries in
//! strict emission order; nothing leaks across runs.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::format::format_values;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Info,
    Log,
    Warn,
    Error,
}

/// One recorded diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEntry {
    pub channel: Channel,
    pub text: String,
}

/// Buffers diagnostic emissions from one evaluation, in call order.
#[derive(Debug, Default)]
pub struct Console {
    entries: RefCell<Vec<CaptureEntry>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, values: &[Value<'_>]) {
        self.entry(Channel::Log, format_values(values));
    }

    pub fn info(&self, values: &[Value<'_>]) {
        self.entry(Channel::Info, format_values(values));
    }

    pub fn warn(&self, values: &[Value<'_>]) {
        self.entry(Channel::Warn, format!("WARN: {}", format_values(values)));
    }

    pub fn error(&self, values: &[Value<'_>]) {
        self.entry(Channel::Error, format!("ERROR: {}", format_values(values)));
    }

    /// Appends a pre-formatted entry. Used for engine-produced lines (return
    /// values, limit diagnostics) that bypass the value formatter.
    pub fn entry(&self, channel: Channel, text: impl Into<String>) {
        self.entries.borrow_mut().push(CaptureEntry {
            channel,
            text: text.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drains the buffered entries, consuming the channel.
    pub fn into_entries(self) -> Vec<CaptureEntry> {
        self.entries.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_emission_order() {
        let console = Console::new();
        console.log(&[Value::text("first")]);
        console.warn(&[Value::text("second")]);
        console.error(&[Value::text("third")]);
        console.info(&[Value::text("fourth")]);

        let entries = console.into_entries();
        let texts: Vec<_> = entries.iter().map(|entry| entry.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["first", "WARN: second", "ERROR: third", "fourth"]
        );
        assert_eq!(entries[0].channel, Channel::Log);
        assert_eq!(entries[3].channel, Channel::Info);
    }

    #[test]
    fn log_and_info_carry_no_marker() {
        let console = Console::new();
        console.log(&[Value::Number(1.0), Value::Number(2.0)]);
        console.info(&[Value::text("plain")]);
        let entries = console.into_entries();
        assert_eq!(entries[0].text, "1 2");
        assert_eq!(entries[1].text, "plain");
    }
}
