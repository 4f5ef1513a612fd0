use super::*;
use async_trait::async_trait;
use chrono::TimeZone;
use movie_sync_models::{MovieRef, Service};
use movie_sync_sources::{NotFoundMovie, SourceResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Destination that cannot place `unknown_titles` unless given a trakt id
#[derive(Default)]
struct FakeDestination {
    history: ViewLog,
    unknown_titles: Vec<String>,
    search_results: HashMap<String, Vec<SearchCandidate>>,
    added_override: Option<usize>,
    submissions: Mutex<Vec<Vec<ViewLogEntry>>>,
    fetch_windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    searches: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDestination {
    fn submissions(&self) -> Vec<Vec<ViewLogEntry>> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Destination for FakeDestination {
    fn destination_name(&self) -> &str {
        "fake"
    }

    async fn authenticate(&self) -> SourceResult<()> {
        Ok(())
    }

    async fn fetch_history(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SourceResult<ViewLog> {
        self.fetch_windows.lock().unwrap().push((start, end));
        Ok(self.history.clone())
    }

    async fn submit_history(&self, entries: &[ViewLogEntry]) -> SourceResult<SubmitReport> {
        self.submissions.lock().unwrap().push(entries.to_vec());

        let not_found: Vec<NotFoundMovie> = entries
            .iter()
            .filter(|e| {
                e.movie.id_for(Service::Trakt).is_none()
                    && self.unknown_titles.iter().any(|t| t == e.movie.title())
            })
            .map(|e| NotFoundMovie {
                title: Some(e.movie.title().to_string()),
                year: e.movie.year(),
            })
            .collect();

        Ok(SubmitReport {
            added: self.added_override.unwrap_or(entries.len() - not_found.len()),
            not_found,
        })
    }

    async fn search_movie(&self, title: &str) -> SourceResult<Vec<SearchCandidate>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.searches.lock().unwrap().push(title.to_string());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.search_results.get(title).cloned().unwrap_or_default())
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, 1, 20, 0, 0).unwrap()
}

fn mubi_movie(id: u64, title: &str, year: Option<u32>) -> Movie {
    Movie::new(title, year, vec![MovieRef::mubi(id, format!("https://mubi.com/films/{}", id))]).unwrap()
}

fn trakt_movie(id: u64, title: &str, year: Option<u32>) -> Movie {
    Movie::new(title, year, vec![MovieRef::trakt(id, None), MovieRef::tmdb(id + 1000)]).unwrap()
}

fn entry(minutes: i64, movie: Movie) -> ViewLogEntry {
    ViewLogEntry::new(base_time() + Duration::minutes(minutes), movie)
}

fn candidate(kind: &str, score: f64, movie: Movie) -> SearchCandidate {
    SearchCandidate {
        kind: kind.to_string(),
        score,
        movie: Some(movie),
    }
}

fn orchestrator(destination: Arc<FakeDestination>) -> SyncOrchestrator {
    SyncOrchestrator::new(destination, SyncSettings::default())
}

#[tokio::test]
async fn test_empty_log_touches_nothing() {
    let destination = Arc::new(FakeDestination::default());

    let outcome = orchestrator(destination.clone()).sync(&Vec::new()).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.submitted, 0);
    assert!(destination.fetch_windows.lock().unwrap().is_empty());
    assert!(destination.submissions().is_empty());
}

#[tokio::test]
async fn test_fetch_window_is_widened_by_slack() {
    let destination = Arc::new(FakeDestination::default());
    let log = vec![
        entry(120, mubi_movie(2, "Later", Some(2000))),
        entry(0, mubi_movie(1, "Earlier", Some(2000))),
    ];

    orchestrator(destination.clone()).sync(&log).await.unwrap();

    let windows = destination.fetch_windows.lock().unwrap().clone();
    assert_eq!(
        windows,
        vec![(base_time() - Duration::minutes(15), base_time() + Duration::minutes(135))]
    );
}

#[tokio::test]
async fn test_exact_copy_submits_nothing() {
    let log = vec![
        entry(0, mubi_movie(1, "Amélie", Some(2001))),
        entry(200, mubi_movie(2, "Stalker", Some(1979))),
    ];
    let destination = Arc::new(FakeDestination {
        history: log.clone(),
        ..Default::default()
    });

    let outcome = orchestrator(destination.clone()).sync(&log).await.unwrap();

    assert!(outcome.unmatched.is_empty());
    assert_eq!(outcome.already_present, 2);
    assert_eq!(outcome.missing, 0);
    assert!(destination.submissions().is_empty());
}

#[tokio::test]
async fn test_title_match_within_slack_counts_as_present() {
    let log = vec![entry(0, mubi_movie(1, "Amélie", Some(2001)))];
    let destination = Arc::new(FakeDestination {
        history: vec![entry(14, trakt_movie(120, "amélie", Some(2001)))],
        ..Default::default()
    });

    let outcome = orchestrator(destination.clone()).sync(&log).await.unwrap();

    assert_eq!(outcome.already_present, 1);
    assert!(destination.submissions().is_empty());
}

#[tokio::test]
async fn test_exactly_slack_apart_is_not_present() {
    let log = vec![entry(0, mubi_movie(1, "Amélie", Some(2001)))];
    let destination = Arc::new(FakeDestination {
        history: vec![
            entry(15, trakt_movie(120, "Amélie", Some(2001))),
            entry(-15, trakt_movie(120, "Amélie", Some(2001))),
        ],
        ..Default::default()
    });

    let outcome = orchestrator(destination.clone()).sync(&log).await.unwrap();

    assert_eq!(outcome.already_present, 0);
    assert_eq!(outcome.submitted, 1);
    assert_eq!(destination.submissions(), vec![log]);
}

#[tokio::test]
async fn test_same_time_different_movie_is_missing() {
    let log = vec![entry(0, mubi_movie(1, "Amélie", Some(2001)))];
    let destination = Arc::new(FakeDestination {
        history: vec![entry(0, trakt_movie(99, "Stalker", Some(1979)))],
        ..Default::default()
    });

    let outcome = orchestrator(destination).sync(&log).await.unwrap();

    assert_eq!(outcome.missing, 1);
    assert_eq!(outcome.submitted, 1);
}

#[tokio::test]
async fn test_not_found_entry_without_candidate_is_unmatched() {
    let missing = entry(60, mubi_movie(3, "Obscure Short", Some(2019)));
    let log = vec![
        entry(0, mubi_movie(1, "Amélie", Some(2001))),
        missing.clone(),
        entry(120, mubi_movie(2, "Stalker", Some(1979))),
    ];
    let destination = Arc::new(FakeDestination {
        unknown_titles: vec!["Obscure Short".to_string()],
        ..Default::default()
    });

    let outcome = orchestrator(destination.clone()).sync(&log).await.unwrap();

    assert_eq!(outcome.submitted, 2);
    assert_eq!(outcome.unmatched, vec![missing]);
    assert_eq!(*destination.searches.lock().unwrap(), vec!["Obscure Short".to_string()]);
    assert_eq!(destination.submissions().len(), 1);
}

#[tokio::test]
async fn test_looked_up_entry_is_resubmitted_with_destination_ids() {
    let log = vec![
        entry(0, mubi_movie(1, "Amélie", Some(2001))),
        entry(60, mubi_movie(3, "Le Fabuleux Destin", Some(2001))),
    ];
    let found = trakt_movie(120, "Amélie", Some(2001));
    let destination = Arc::new(FakeDestination {
        unknown_titles: vec!["Le Fabuleux Destin".to_string()],
        search_results: HashMap::from([(
            "Le Fabuleux Destin".to_string(),
            vec![
                candidate("movie", 1400.0, trakt_movie(7, "Too Weak", Some(2001))),
                candidate("movie", 1900.0, found.clone()),
                candidate("show", 2500.0, trakt_movie(8, "A Show", Some(2001))),
            ],
        )]),
        ..Default::default()
    });

    let outcome = orchestrator(destination.clone()).sync(&log).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.submitted, 2);
    assert_eq!(outcome.recovered, 1);

    let submissions = destination.submissions();
    assert_eq!(submissions.len(), 2);
    let resubmitted = &submissions[1][0];
    assert_eq!(resubmitted.watched_at, base_time() + Duration::minutes(60));
    assert_eq!(resubmitted.movie.title(), "Amélie");
    assert_eq!(resubmitted.movie.id_for(Service::Trakt), Some("120"));
    assert_eq!(resubmitted.movie.id_for(Service::Mubi), Some("3"));
}

#[tokio::test]
async fn test_added_count_disagreeing_with_misses_is_fatal() {
    let log = vec![
        entry(0, mubi_movie(1, "A", Some(2001))),
        entry(60, mubi_movie(2, "B", Some(2001))),
        entry(120, mubi_movie(3, "C", Some(2001))),
    ];
    let destination = Arc::new(FakeDestination {
        unknown_titles: vec!["C".to_string()],
        added_override: Some(1),
        ..Default::default()
    });

    let err = orchestrator(destination).sync(&log).await.unwrap_err();

    assert!(matches!(err, SyncError::Consistency(_)));
}

#[tokio::test]
async fn test_round_two_miss_is_fatal() {
    let log = vec![entry(0, mubi_movie(1, "Amélie", Some(2001)))];
    // The candidate carries no trakt id, so the fake rejects it again
    let unplaceable = Movie::new("Amélie", Some(2001), vec![MovieRef::tmdb(194)]).unwrap();
    let destination = Arc::new(FakeDestination {
        unknown_titles: vec!["Amélie".to_string()],
        search_results: HashMap::from([(
            "Amélie".to_string(),
            vec![candidate("movie", 2000.0, unplaceable)],
        )]),
        ..Default::default()
    });

    let err = orchestrator(destination).sync(&log).await.unwrap_err();

    assert!(matches!(err, SyncError::Consistency(_)));
}

#[tokio::test]
async fn test_dry_run_stops_before_submitting() {
    let log = vec![
        entry(0, mubi_movie(1, "Amélie", Some(2001))),
        entry(60, mubi_movie(2, "Stalker", Some(1979))),
    ];
    let destination = Arc::new(FakeDestination::default());
    let orchestrator =
        SyncOrchestrator::new(destination.clone(), SyncSettings::default().with_dry_run(true));

    let outcome = orchestrator.sync(&log).await.unwrap();

    assert_eq!(outcome.missing, 2);
    assert_eq!(outcome.submitted, 0);
    assert!(destination.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lookups_respect_concurrency_limit() {
    let log: ViewLog = (0..10)
        .map(|i| entry(i * 60, mubi_movie(i as u64, &format!("Lost {}", i), Some(2000))))
        .collect();
    let destination = Arc::new(FakeDestination {
        unknown_titles: (0..10).map(|i| format!("Lost {}", i)).collect(),
        ..Default::default()
    });
    let settings = SyncSettings {
        lookup_concurrency: 3,
        ..SyncSettings::default()
    };

    let outcome = SyncOrchestrator::new(destination.clone(), settings)
        .sync(&log)
        .await
        .unwrap();

    assert_eq!(outcome.unmatched.len(), 10);
    assert_eq!(destination.searches.lock().unwrap().len(), 10);
    assert_eq!(destination.max_in_flight.load(Ordering::SeqCst), 3);
    // Lookup order is preserved in the report
    assert_eq!(outcome.unmatched, log);
}

#[test]
fn test_select_candidate_filters_and_orders() {
    let candidates = || {
        vec![
            candidate("movie", 1500.0, trakt_movie(1, "At Threshold", Some(2001))),
            candidate("movie", 1600.0, trakt_movie(2, "Low", Some(2001))),
            candidate("movie", 2200.0, trakt_movie(3, "High", Some(2001))),
            candidate("movie", 3000.0, trakt_movie(4, "Wrong Year", Some(2002))),
            candidate("person", 4000.0, trakt_movie(5, "Not A Movie", Some(2001))),
            SearchCandidate {
                kind: "movie".to_string(),
                score: 5000.0,
                movie: None,
            },
        ]
    };

    let highest = select_candidate(candidates(), Some(2001), CandidateSelection::HighestScore, LOOKUP_MIN_SCORE);
    assert_eq!(highest.unwrap().title(), "High");

    let lowest = select_candidate(candidates(), Some(2001), CandidateSelection::LowestScore, LOOKUP_MIN_SCORE);
    assert_eq!(lowest.unwrap().title(), "Low");

    // Without a known year any year qualifies
    let any_year = select_candidate(candidates(), None, CandidateSelection::HighestScore, LOOKUP_MIN_SCORE);
    assert_eq!(any_year.unwrap().title(), "Wrong Year");

    assert!(select_candidate(Vec::new(), None, CandidateSelection::HighestScore, LOOKUP_MIN_SCORE).is_none());
}

#[test]
fn test_settings_from_config() {
    let config = SyncConfig {
        lookup_concurrency: 0,
        candidate_selection: CandidateSelection::LowestScore,
        ..SyncConfig::default()
    };

    let settings = SyncSettings::from_config(&config);

    assert_eq!(settings.lookup_concurrency, 1);
    assert_eq!(settings.candidate_selection, CandidateSelection::LowestScore);
    assert_eq!(settings.slack, Duration::minutes(15));
    assert!(!settings.dry_run);
}

mod end_to_end {
    use super::*;
    use movie_sync_config::credentials::TRAKT_ACCESS_TOKEN;
    use movie_sync_config::{MemoryTokenStore, TraktSettings};
    use movie_sync_sources::http::testing::ScriptedTransport;
    use movie_sync_sources::http::HttpResponse;
    use movie_sync_sources::{DevicePrompt, TraktClient};
    use serde_json::{json, Value};

    struct NoPrompt;

    impl DevicePrompt for NoPrompt {
        fn show_code(&self, _: &str, _: &str, _: std::time::Duration) {
            panic!("device authorization should not be needed");
        }
    }

    fn amelie_entry() -> ViewLogEntry {
        ViewLogEntry::new(
            Utc.with_ymd_and_hms(2023, 5, 1, 20, 0, 0).unwrap(),
            Movie::new(
                "Amélie",
                Some(2001),
                vec![MovieRef::mubi(42, "https://mubi.com/films/amelie")],
            )
            .unwrap(),
        )
    }

    fn trakt(sync_response: Value, search_response: Value) -> (Arc<ScriptedTransport>, Arc<TraktClient>) {
        let transport = Arc::new(ScriptedTransport::new(move |request| {
            if request.url.contains("sync/history/movies") {
                HttpResponse::ok_json(json!([])).with_header("X-Pagination-Page-Count", "1")
            } else if request.url.ends_with("sync/history") {
                HttpResponse::with_status(201).with_json(sync_response.clone())
            } else if request.url.contains("search/movie") {
                HttpResponse::ok_json(search_response.clone())
            } else {
                HttpResponse::with_status(404)
            }
        }));
        let settings = TraktSettings {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            language: "en".to_string(),
        };
        let store = Arc::new(MemoryTokenStore::with_entries([(TRAKT_ACCESS_TOKEN, "tok")]));
        let client = TraktClient::new(&settings, transport.clone(), store, Arc::new(NoPrompt));
        (transport, Arc::new(client))
    }

    #[tokio::test]
    async fn test_amelie_added() {
        let (transport, client) = trakt(
            json!({"added": {"movies": 1}, "not_found": {"movies": []}}),
            json!([]),
        );

        let outcome = SyncOrchestrator::new(client, SyncSettings::default())
            .sync(&vec![amelie_entry()])
            .await
            .unwrap();

        assert!(outcome.unmatched.is_empty());
        assert_eq!(outcome.submitted, 1);
        assert!(transport.requests_to("search/movie").is_empty());

        let submitted = &transport.requests_to("sync/history")[1];
        let body: Value = serde_json::from_str(submitted.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["movies"][0]["title"], "Amélie");
        assert_eq!(body["movies"][0]["watched_at"], "2023-05-01T20:00:00.000Z");
    }

    #[tokio::test]
    async fn test_amelie_not_found_and_no_candidate_above_threshold() {
        let (transport, client) = trakt(
            json!({"added": {"movies": 0}, "not_found": {"movies": [{"title": "Amélie", "year": 2001}]}}),
            json!([{
                "type": "movie",
                "score": 1500,
                "movie": {"title": "Amélie", "year": 2001, "ids": {"trakt": 120, "slug": "amelie-2001", "tmdb": 194}}
            }]),
        );

        let outcome = SyncOrchestrator::new(client, SyncSettings::default())
            .sync(&vec![amelie_entry()])
            .await
            .unwrap();

        assert_eq!(outcome.unmatched, vec![amelie_entry()]);
        assert_eq!(outcome.submitted, 0);
        assert_eq!(transport.requests_to("search/movie").len(), 1);
        let submissions = transport
            .requests_to("sync/history")
            .into_iter()
            .filter(|r| r.url.ends_with("sync/history"))
            .count();
        assert_eq!(submissions, 1);
    }
}
