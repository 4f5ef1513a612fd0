use crate::id_matching::matches;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use movie_sync_config::{CandidateSelection, SyncConfig};
use movie_sync_models::{Movie, SyncOutcome, ViewLog, ViewLogEntry};
use movie_sync_sources::{Destination, SearchCandidate, SourceError, SubmitReport};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Search results at or below this score are too weak to act on
pub const LOOKUP_MIN_SCORE: f64 = 1500.0;

/// Tolerance for matching watch times, also used to widen the fetch window
pub fn default_slack() -> Duration {
    Duration::minutes(15)
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The destination's answer contradicts itself or our submission
    #[error("Inconsistent response from destination: {0}")]
    Consistency(String),
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub slack: Duration,
    pub lookup_concurrency: usize,
    pub candidate_selection: CandidateSelection,
    pub min_lookup_score: f64,
    /// Stop after working out what is missing
    pub dry_run: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            slack: default_slack(),
            lookup_concurrency: 4,
            candidate_selection: CandidateSelection::default(),
            min_lookup_score: LOOKUP_MIN_SCORE,
            dry_run: false,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            lookup_concurrency: config.lookup_concurrency.max(1),
            candidate_selection: config.candidate_selection,
            ..Self::default()
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Reconciles a source view log into a destination
pub struct SyncOrchestrator {
    destination: Arc<dyn Destination>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(destination: Arc<dyn Destination>, settings: SyncSettings) -> Self {
        Self {
            destination,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Submit every entry of `view_log` the destination does not have yet.
    ///
    /// Entries the destination cannot place by title and year are looked up
    /// by title and resubmitted with the destination's ids. Entries that
    /// still cannot be identified end up in [`SyncOutcome::unmatched`].
    #[instrument(skip(self, view_log), fields(entries = view_log.len(), destination = self.destination.destination_name()))]
    pub async fn sync(&self, view_log: &ViewLog) -> Result<SyncOutcome, SyncError> {
        let Some((start, end)) = sync_window(view_log, self.settings.slack) else {
            info!("Nothing to sync");
            return Ok(SyncOutcome::default());
        };
        let name = self.destination.destination_name();

        let existing = self.destination.fetch_history(start, end).await?;
        let (to_submit, already_present) = partition_missing(view_log, &existing, self.settings.slack);

        info!(
            operation = "diff",
            destination = name,
            already_present,
            missing = to_submit.len(),
            "Entries missing on {}: {}",
            name,
            to_submit.len()
        );

        let mut outcome = SyncOutcome {
            already_present,
            missing: to_submit.len(),
            ..SyncOutcome::default()
        };

        if self.settings.dry_run {
            for entry in &to_submit {
                info!(
                    "Would submit {} ({}) watched at {}",
                    entry.movie.title(),
                    format_year(entry.movie.year()),
                    entry.watched_at
                );
            }
            return Ok(outcome);
        }

        if to_submit.is_empty() {
            return Ok(outcome);
        }

        let (added, misses) = self.submit(&to_submit).await?;
        outcome.submitted = added;

        if misses.is_empty() {
            return Ok(outcome);
        }

        info!(
            "Looking up entries that failed to sync to {} (movie name mismatch): {}",
            name,
            misses.len()
        );
        let (round_two, unmatched) = self.look_up(misses).await?;

        if !round_two.is_empty() {
            info!("Syncing looked up movies to {}: {}", name, round_two.len());
            let (added, misses) = self.submit(&round_two).await?;
            if !misses.is_empty() {
                return Err(SyncError::Consistency(format!(
                    "{} looked up movies were still not found",
                    misses.len()
                )));
            }
            outcome.submitted += added;
            outcome.recovered = added;
        }

        if !unmatched.is_empty() {
            warn!("Failed to look up {} movies on {}", unmatched.len(), name);
        }
        outcome.unmatched = unmatched;

        Ok(outcome)
    }

    /// Submit one batch, returning the accepted count and the entries that missed
    async fn submit(&self, entries: &[ViewLogEntry]) -> Result<(usize, Vec<ViewLogEntry>), SyncError> {
        let report = self.destination.submit_history(entries).await?;
        let misses = misses_of(entries, &report);

        let expected_misses = entries.len().checked_sub(report.added).ok_or_else(|| {
            SyncError::Consistency(format!(
                "{} entries added out of {} submitted",
                report.added,
                entries.len()
            ))
        })?;
        if misses.len() != expected_misses {
            return Err(SyncError::Consistency(format!(
                "{} of {} submitted entries were added but {} were reported as not found",
                report.added,
                entries.len(),
                misses.len()
            )));
        }

        Ok((report.added, misses))
    }

    /// Search the destination for every miss, at most `lookup_concurrency` at a time.
    ///
    /// Returns the entries to resubmit, enriched with the destination's
    /// identity, and the entries no candidate was found for.
    async fn look_up(&self, misses: Vec<ViewLogEntry>) -> Result<(Vec<ViewLogEntry>, Vec<ViewLogEntry>), SyncError> {
        let results: Vec<(ViewLogEntry, Option<Movie>)> = stream::iter(misses)
            .map(|entry| async move {
                debug!("Looking up movie on {}: {:?}", self.destination.destination_name(), entry.movie);
                let candidates = self.destination.search_movie(entry.movie.title()).await?;
                let found = select_candidate(
                    candidates,
                    entry.movie.year(),
                    self.settings.candidate_selection,
                    self.settings.min_lookup_score,
                );
                Ok::<_, SourceError>((entry, found))
            })
            .buffered(self.settings.lookup_concurrency.max(1))
            .try_collect()
            .await?;

        let mut round_two = Vec::new();
        let mut unmatched = Vec::new();
        for (entry, found) in results {
            match found {
                Some(found) => round_two.push(ViewLogEntry::new(
                    entry.watched_at,
                    entry.movie.enriched_with(&found),
                )),
                None => unmatched.push(entry),
            }
        }

        Ok((round_two, unmatched))
    }
}

/// Time range covering every entry of `view_log`, widened by `slack` on both ends
pub fn sync_window(view_log: &ViewLog, slack: Duration) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = view_log.iter().map(|e| e.watched_at).min()?;
    let last = view_log.iter().map(|e| e.watched_at).max()?;
    Some((first - slack, last + slack))
}

/// Split `view_log` into entries missing from `existing` and a count of those present.
///
/// An entry is present when `existing` holds the same movie watched strictly
/// less than `slack` apart.
pub fn partition_missing(view_log: &ViewLog, existing: &ViewLog, slack: Duration) -> (Vec<ViewLogEntry>, usize) {
    let (present, missing): (Vec<&ViewLogEntry>, Vec<&ViewLogEntry>) =
        view_log.iter().partition(|entry| {
            existing.iter().any(|other| {
                let delta = other.watched_at - entry.watched_at;
                delta < slack && -delta < slack && matches(&other.movie, &entry.movie)
            })
        });

    (missing.into_iter().cloned().collect(), present.len())
}

/// Entries whose title and year the destination reported as not found
fn misses_of(entries: &[ViewLogEntry], report: &SubmitReport) -> Vec<ViewLogEntry> {
    entries
        .iter()
        .filter(|entry| {
            report.not_found.iter().any(|missed| {
                missed.title.as_deref() == Some(entry.movie.title()) && missed.year == entry.movie.year()
            })
        })
        .cloned()
        .collect()
}

/// Pick the search result a lookup settles on.
///
/// Only movies scoring above `min_score` qualify, and when `year` is known
/// the candidate's year must equal it.
pub fn select_candidate(
    candidates: Vec<SearchCandidate>,
    year: Option<u32>,
    selection: CandidateSelection,
    min_score: f64,
) -> Option<Movie> {
    let eligible = candidates
        .into_iter()
        .filter(|c| c.kind == "movie" && c.score > min_score)
        .filter_map(|c| c.movie.map(|movie| (c.score, movie)))
        .filter(|(_, movie)| year.map_or(true, |year| movie.year() == Some(year)));

    let chosen = match selection {
        CandidateSelection::HighestScore => eligible.max_by(|a, b| a.0.total_cmp(&b.0)),
        CandidateSelection::LowestScore => eligible.min_by(|a, b| a.0.total_cmp(&b.0)),
    };

    chosen.map(|(_, movie)| movie)
}

pub(crate) fn format_year(year: Option<u32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
mod tests;
