use chrono::{DateTime, Utc};
use movie_sync_models::{Movie, MovieRef, ViewLogEntry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MubiFilm {
    pub id: u64,
    pub title: String,
    pub year: Option<u32>,
    pub web_url: String,
    /// Minutes
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MubiViewLog {
    pub watched_at: DateTime<Utc>,
    pub film: MubiFilm,
}

#[derive(Debug, Deserialize)]
pub struct MubiViewLogPage {
    #[serde(default)]
    pub view_logs: Vec<MubiViewLog>,
}

impl MubiFilm {
    pub fn to_movie(&self) -> Option<Movie> {
        Movie::new(
            self.title.clone(),
            self.year,
            [MovieRef::mubi(self.id, self.web_url.clone())],
        )
    }
}

impl MubiViewLog {
    pub fn to_entry(&self) -> Option<ViewLogEntry> {
        self.film
            .to_movie()
            .map(|movie| ViewLogEntry::new(self.watched_at, movie))
    }
}
