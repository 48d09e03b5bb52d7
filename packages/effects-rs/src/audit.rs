//! Debug-only dispatch auditing for development visibility.
//!
//! A [`DispatchLog`] attached to a bus records every fan-out: the action's
//! kind and how many subscribers received it. It is only compiled in debug
//! builds and has zero release cost.
//!
//! Auditing catches wiring mistakes: actions nobody observes usually mean an
//! effect was never registered, or its `of_type` filter names the wrong kind.
//!
//! # Usage
//!
//! ```ignore
//! let log = SharedDispatchLog::default();
//! bus.attach_audit(Arc::clone(&log));
//!
//! // ... run the application ...
//!
//! for record in log.unobserved() {
//!     tracing::warn!(kind = %record.kind, "action had no observers");
//! }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maximum number of dispatch records to retain.
const MAX_LOG_ENTRIES: usize = 1000;

/// A single recorded dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    /// The dispatched action's kind.
    pub kind: String,
    /// Number of subscribers the action was delivered to.
    pub observers: usize,
}

impl DispatchRecord {
    pub(crate) fn new(kind: &str, observers: usize) -> Self {
        Self {
            kind: kind.to_string(),
            observers,
        }
    }

    /// Returns true if no subscriber received this action.
    pub fn was_unobserved(&self) -> bool {
        self.observers == 0
    }
}

/// Bounded log of recent dispatches.
///
/// Thread-safe; retains only the most recent 1000 records.
#[derive(Debug, Default)]
pub struct DispatchLog {
    records: Mutex<VecDeque<DispatchRecord>>,
}

impl DispatchLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)),
        }
    }

    fn lock_records(&self) -> MutexGuard<'_, VecDeque<DispatchRecord>> {
        // The log is debug-only; prefer availability over strict consistency
        // if a recording thread panicked.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record(&self, record: DispatchRecord) {
        let mut records = self.lock_records();
        if records.len() >= MAX_LOG_ENTRIES {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> Vec<DispatchRecord> {
        self.lock_records().iter().cloned().collect()
    }

    /// The most recent `n` records, newest first.
    pub fn recent(&self, n: usize) -> Vec<DispatchRecord> {
        self.lock_records().iter().rev().take(n).cloned().collect()
    }

    /// Records for actions no subscriber received.
    pub fn unobserved(&self) -> Vec<DispatchRecord> {
        self.lock_records()
            .iter()
            .filter(|record| record.was_unobserved())
            .cloned()
            .collect()
    }

    /// Summary statistics over the retained records.
    pub fn stats(&self) -> DispatchStats {
        let records = self.lock_records();
        DispatchStats {
            total: records.len(),
            unobserved: records.iter().filter(|r| r.was_unobserved()).count(),
        }
    }

    /// Drop all retained records.
    pub fn clear(&self) {
        self.lock_records().clear();
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.lock_records().is_empty()
    }
}

/// Shared handle to a dispatch log.
pub type SharedDispatchLog = Arc<DispatchLog>;

/// Summary statistics from a [`DispatchLog`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchStats {
    /// Total dispatches retained.
    pub total: usize,
    /// Dispatches no subscriber received.
    pub unobserved: usize,
}
