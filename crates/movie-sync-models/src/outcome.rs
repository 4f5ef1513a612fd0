use serde::Serialize;
use crate::view_log::ViewLogEntry;

/// Result of reconciling a source log against the destination
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    /// Entries no destination identity could be found for
    pub unmatched: Vec<ViewLogEntry>,
    /// Entries the destination already had within the slack window
    pub already_present: usize,
    /// Entries the destination lacked before anything was submitted
    pub missing: usize,
    /// Entries accepted by the destination, across both submission rounds
    pub submitted: usize,
    /// Entries accepted only after a title lookup
    pub recovered: usize,
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}
