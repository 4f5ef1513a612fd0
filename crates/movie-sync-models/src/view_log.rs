use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::movie::Movie;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViewLogEntry {
    pub watched_at: DateTime<Utc>,
    pub movie: Movie,
}

impl ViewLogEntry {
    pub fn new(watched_at: DateTime<Utc>, movie: Movie) -> Self {
        Self { watched_at, movie }
    }
}

/// Watch history in arrival order; only `watched_at` carries meaning
pub type ViewLog = Vec<ViewLogEntry>;
