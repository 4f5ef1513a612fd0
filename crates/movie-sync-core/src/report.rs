use crate::sync::format_year;
use chrono::{DateTime, Utc};
use movie_sync_models::ViewLogEntry;
use serde::Serialize;

const WATCHED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// One entry that could not be synced, flattened for display
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnmatchedRow {
    pub title: String,
    pub year: Option<u32>,
    pub watched_at: DateTime<Utc>,
    pub urls: Vec<String>,
}

impl From<&ViewLogEntry> for UnmatchedRow {
    fn from(entry: &ViewLogEntry) -> Self {
        Self {
            title: entry.movie.title().to_string(),
            year: entry.movie.year(),
            watched_at: entry.watched_at,
            urls: entry.movie.services().iter().map(|r| r.url.clone()).collect(),
        }
    }
}

pub fn unmatched_rows(unmatched: &[ViewLogEntry]) -> Vec<UnmatchedRow> {
    unmatched.iter().map(UnmatchedRow::from).collect()
}

pub fn format_watched_at(watched_at: &DateTime<Utc>) -> String {
    watched_at.format(WATCHED_AT_FORMAT).to_string()
}

/// Plain-text listing of entries that could not be synced
pub fn format_unmatched(unmatched: &[ViewLogEntry]) -> String {
    let mut out = String::new();
    for row in unmatched_rows(unmatched) {
        out.push_str(&format!("- {} ({})\n", row.title, format_year(row.year)));
        out.push_str(&format!("  watched at {}\n", format_watched_at(&row.watched_at)));
        out.push_str(&format!("  {}\n", row.urls.join(" ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use movie_sync_models::{Movie, MovieRef};

    #[test]
    fn test_format_unmatched() {
        let movie = Movie::new(
            "Amélie",
            Some(2001),
            vec![
                MovieRef::mubi(42, "https://mubi.com/films/amelie"),
                MovieRef::tmdb(194),
            ],
        )
        .unwrap();
        let entry = ViewLogEntry::new(Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap(), movie);

        assert_eq!(
            format_unmatched(&[entry]),
            "- Amélie (2001)\n  watched at 2023-05-01 10:00:00 UTC\n  https://mubi.com/films/amelie https://www.themoviedb.org/movie/194\n"
        );
    }

    #[test]
    fn test_unknown_year_is_marked() {
        let movie = Movie::new("Untitled", None, vec![MovieRef::tmdb(1)]).unwrap();
        let entry = ViewLogEntry::new(Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap(), movie);

        assert!(format_unmatched(&[entry]).starts_with("- Untitled (?)\n"));
        assert_eq!(format_unmatched(&[]), "");
    }
}
