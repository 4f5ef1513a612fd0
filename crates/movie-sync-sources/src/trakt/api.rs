use crate::error::SourceResult;
use crate::http::{paginate, ApiClient, Page, PageTermination, RequestOptions};
use crate::traits::{NotFoundMovie, SearchCandidate, SubmitReport};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use movie_sync_models::{Movie, MovieRef, Service, ViewLog, ViewLogEntry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

const HISTORY_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraktIds {
    pub trakt: Option<u64>,
    pub slug: Option<String>,
    pub tmdb: Option<u64>,
    pub imdb: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktMovie {
    pub title: String,
    pub year: Option<u32>,
    #[serde(default)]
    pub ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktHistoryItem {
    watched_at: DateTime<Utc>,
    action: String,
    movie: Option<TraktMovie>,
}

#[derive(Debug, Default, Deserialize)]
struct MovieCount {
    #[serde(default)]
    movies: usize,
}

#[derive(Debug, Default, Deserialize)]
struct NotFoundMovies {
    #[serde(default)]
    movies: Vec<NotFoundItem>,
}

#[derive(Debug, Deserialize)]
struct NotFoundItem {
    title: Option<String>,
    year: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SyncHistoryResponse {
    #[serde(default)]
    added: MovieCount,
    #[serde(default)]
    not_found: NotFoundMovies,
}

#[derive(Debug, Deserialize)]
struct TraktSearchResult {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    score: f64,
    movie: Option<TraktMovie>,
}

impl TraktMovie {
    /// Movie with every id trakt knows for it; `None` when trakt gave no ids
    pub fn to_movie(&self) -> Option<Movie> {
        let ids = &self.ids;
        let refs = ids
            .trakt
            .map(|id| MovieRef::trakt(id, ids.slug.as_deref()))
            .into_iter()
            .chain(ids.tmdb.map(MovieRef::tmdb))
            .chain(
                ids.imdb
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .map(MovieRef::imdb),
            );

        Movie::new(self.title.clone(), self.year, refs)
    }
}

/// `ids` object for a submission, with only the ids trakt understands
fn submission_ids(movie: &Movie) -> Value {
    let mut ids = Map::new();
    if let Some(id) = movie.id_for(Service::Trakt).and_then(|id| id.parse::<u64>().ok()) {
        ids.insert("trakt".to_string(), json!(id));
    }
    if let Some(id) = movie.id_for(Service::Tmdb).and_then(|id| id.parse::<u64>().ok()) {
        ids.insert("tmdb".to_string(), json!(id));
    }
    if let Some(id) = movie.id_for(Service::Imdb) {
        ids.insert("imdb".to_string(), json!(id));
    }
    Value::Object(ids)
}

fn submission_body(entries: &[ViewLogEntry]) -> Value {
    let movies: Vec<Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "watched_at": entry.watched_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                "title": entry.movie.title(),
                "year": entry.movie.year(),
                "ids": submission_ids(&entry.movie),
            })
        })
        .collect();

    json!({ "movies": movies })
}

async fn fetch_history_page(
    api: &ApiClient,
    access_token: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page: u32,
) -> SourceResult<Page<ViewLogEntry>> {
    let response = api
        .request(
            "sync/history/movies",
            RequestOptions::get()
                .query("start_at", start.to_rfc3339_opts(SecondsFormat::Millis, true))
                .query("end_at", end.to_rfc3339_opts(SecondsFormat::Millis, true))
                .query("page", page)
                .query("limit", HISTORY_PAGE_LIMIT)
                .bearer(access_token),
        )
        .await?
        .error_for_status()?;

    let page_count = response
        .header("X-Pagination-Page-Count")
        .and_then(|h| h.trim().parse().ok());

    let items: Vec<TraktHistoryItem> = response.json()?;
    let entries = items
        .into_iter()
        .filter(|item| item.action == "watch")
        .filter_map(|item| {
            let movie = item.movie?.to_movie();
            if movie.is_none() {
                debug!("Trakt history: skipping movie without ids watched at {}", item.watched_at);
            }
            movie.map(|movie| ViewLogEntry::new(item.watched_at, movie))
        })
        .collect();

    Ok(Page::new(entries).with_page_count(page_count))
}

/// Fetch movie watch history between `start` and `end`, following pagination
pub async fn get_watch_history(
    api: &ApiClient,
    access_token: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> SourceResult<ViewLog> {
    paginate(PageTermination::PageCount, |page| {
        fetch_history_page(api, access_token, start, end, page)
    })
    .try_collect()
    .await
}

/// Add watch history entries in one batch
pub async fn add_watch_history(
    api: &ApiClient,
    access_token: &str,
    entries: &[ViewLogEntry],
) -> SourceResult<SubmitReport> {
    let response = api
        .request(
            "sync/history",
            RequestOptions::post(submission_body(entries)).bearer(access_token),
        )
        .await?
        .error_for_status()?;

    let parsed: SyncHistoryResponse = response.json()?;
    debug!(
        "Trakt sync/history: added={}, not_found={}",
        parsed.added.movies,
        parsed.not_found.movies.len()
    );

    Ok(SubmitReport {
        added: parsed.added.movies,
        not_found: parsed
            .not_found
            .movies
            .into_iter()
            .map(|m| NotFoundMovie {
                title: m.title,
                year: m.year,
            })
            .collect(),
    })
}

/// Text search for movies
/// Reference: https://trakt.docs.apiary.io/#reference/search/text-query/get-text-query-results
pub async fn search_movies(api: &ApiClient, title: &str) -> SourceResult<Vec<SearchCandidate>> {
    let response = api
        .request("search/movie", RequestOptions::get().query("query", title))
        .await?
        .error_for_status()?;

    let results: Vec<TraktSearchResult> = response.json()?;
    Ok(results
        .into_iter()
        .map(|result| SearchCandidate {
            kind: result.item_type,
            score: result.score,
            movie: result.movie.as_ref().and_then(TraktMovie::to_movie),
        })
        .collect())
}
