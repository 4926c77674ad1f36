//! Timestamped log entries and the bounded buffer that holds the most recent
//! ones for display.

use std::collections::VecDeque;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::profile::RiskLevel;

/// Default number of entries kept on screen.
pub const DEFAULT_CAPACITY: usize = 7;

/// Display styling hint for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine output.
    #[default]
    Info,
    /// Highlighted output.
    Warning,
    /// Alert output.
    Critical,
}

impl Severity {
    /// Severity used for an entry about a profile with this risk.
    #[must_use]
    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => Self::Info,
            RiskLevel::Medium => Self::Warning,
            RiskLevel::High | RiskLevel::Critical => Self::Critical,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One line of the live feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Tick that produced the entry.
    pub tick: u32,
    /// Wall-clock time the entry was formatted at.
    pub timestamp: NaiveTime,
    /// Rendered message.
    pub text: String,
    /// Styling hint.
    pub severity: Severity,
}

impl LogEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(tick: u32, timestamp: NaiveTime, text: impl Into<String>, severity: Severity) -> Self {
        Self {
            tick,
            timestamp,
            text: text.into(),
            severity,
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.text)
    }
}

/// Bounded FIFO of the most recent entries, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the evicted oldest entry if the buffer was full.
    pub fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Snapshot of the entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
