//! Decision ledger.
//!
//! Caller-owned, append-only record of every recommendation's outcome in the
//! order the engine processed them. The engine borrows it mutably for the
//! duration of a run; entries already written are never touched again.

use serde::Serialize;
use vigil_types::{DecisionRecord, LedgerEntry};

/// Append-only list of per-recommendation outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionLedger {
    entries: Vec<LedgerEntry>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome.
    pub(crate) fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// All entries in arrival order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Terminal decisions, in arrival order.
    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.entries.iter().filter_map(LedgerEntry::decision)
    }

    /// Number of entries that never reached a decision.
    pub fn unresolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_unresolved()).count()
    }

    /// True when every entry holds a terminal decision.
    pub fn is_complete(&self) -> bool {
        self.unresolved_count() == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
