//! Migration status tracking

use crate::migration::state_table::AppliedRecord;
use crate::migration::unit::UnitName;

/// Snapshot of applied vs pending units.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Applied records (from the bookkeeping table), filename ascending
    pub applied: Vec<AppliedRecord>,

    /// Pending units (on disk, not yet applied), filename ascending
    pub pending: Vec<UnitName>,

    /// Total number of units (applied + pending)
    pub total: usize,

    /// Number of applied units
    pub applied_count: usize,

    /// Number of pending units
    pub pending_count: usize,
}

impl MigrationStatus {
    #[must_use]
    pub fn new(applied: Vec<AppliedRecord>, pending: Vec<UnitName>) -> Self {
        let applied_count = applied.len();
        let pending_count = pending.len();
        let total = applied_count + pending_count;

        Self {
            applied,
            pending,
            total,
            applied_count,
            pending_count,
        }
    }

    /// Check if all units are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count == 0
    }

    /// The most recently applied filename
    #[must_use]
    pub fn latest_applied(&self) -> Option<&str> {
        self.applied.last().map(|record| record.filename.as_str())
    }

    /// The next pending unit
    #[must_use]
    pub fn next_pending(&self) -> Option<&UnitName> {
        self.pending.first()
    }
}
