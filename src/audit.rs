use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditLevel::Info => write!(f, "info"),
            AuditLevel::Warn => write!(f, "warn"),
            AuditLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub level: AuditLevel,
    pub message: String,
}

/// Bounded in-memory audit trail of scheduler activity.
///
/// `record` is fire-and-forget: it appends under a short lock and never
/// blocks scheduling. Only the newest entries are kept.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    pub fn record(&self, level: AuditLevel, message: impl Into<String>) {
        let entry = AuditEntry {
            at: Utc::now(),
            level,
            message: message.into(),
        };
        let mut entries = self.entries.lock().unwrap();
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `limit` entries in chronological order.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let log = AuditLog::new(10);
        log.record(AuditLevel::Info, "first");
        log.record(AuditLevel::Error, "second");

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "first");
        assert_eq!(recent[1].level, AuditLevel::Error);
    }

    #[test]
    fn keeps_only_newest_entries() {
        let log = AuditLog::new(2);
        log.record(AuditLevel::Info, "a");
        log.record(AuditLevel::Info, "b");
        log.record(AuditLevel::Info, "c");

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "b");
        assert_eq!(recent[1].message, "c");
    }

    #[test]
    fn recent_respects_limit() {
        let log = AuditLog::new(10);
        for i in 0..5 {
            log.record(AuditLevel::Info, format!("entry {i}"));
        }

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "entry 3");
        assert_eq!(recent[1].message, "entry 4");
    }
}
