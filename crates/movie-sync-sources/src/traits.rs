use async_trait::async_trait;
use chrono::{DateTime, Utc};
use movie_sync_models::{Movie, ViewLog, ViewLogEntry};
use crate::error::SourceResult;

/// A read-only origin of watch history
#[async_trait]
pub trait HistorySource: Send + Sync {
    fn source_name(&self) -> &str;

    /// Watch history from `since` onwards (everything when `None`)
    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> SourceResult<ViewLog>;
}

/// A movie the destination could not place, as echoed back by it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundMovie {
    pub title: Option<String>,
    pub year: Option<u32>,
}

/// Destination's verdict on a batch submission
#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    pub added: usize,
    pub not_found: Vec<NotFoundMovie>,
}

/// One search hit
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    /// Result type as reported by the destination (`movie`, `show`, ...)
    pub kind: String,
    pub score: f64,
    pub movie: Option<Movie>,
}

/// The read/write store watch history is synced into
#[async_trait]
pub trait Destination: Send + Sync {
    fn destination_name(&self) -> &str;

    /// Make sure later calls are authenticated, running any login needed
    async fn authenticate(&self) -> SourceResult<()>;

    /// Watched movies between `start` and `end`, inclusive
    async fn fetch_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<ViewLog>;

    async fn submit_history(&self, entries: &[ViewLogEntry]) -> SourceResult<SubmitReport>;

    async fn search_movie(&self, title: &str) -> SourceResult<Vec<SearchCandidate>>;
}
