use crate::error::SourceResult;
use crate::http::{paginate_pages, ApiClient, HttpTransport, Page, PageTermination, RequestOptions, RetryPolicy};
use crate::mubi::api::MubiViewLogPage;
use crate::mubi::{MUBI_API_BASE, MUBI_PER_PAGE};
use crate::traits::HistorySource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use movie_sync_config::MubiSettings;
use movie_sync_models::{ViewLog, ViewLogEntry};
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only client for the MUBI view log
pub struct MubiClient {
    api: ApiClient,
}

impl MubiClient {
    pub fn new(settings: &MubiSettings, transport: Arc<dyn HttpTransport>) -> Self {
        let api = ApiClient::new(MUBI_API_BASE, transport, &settings.language)
            .with_header("Authorization", format!("Bearer {}", settings.token))
            .with_header("Client", "web")
            .with_header("Client-Country", settings.country.clone());

        Self { api }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.api = self.api.with_retry_policy(retry);
        self
    }

    async fn fetch_page(&self, page: u32) -> SourceResult<Page<ViewLogEntry>> {
        let response = self
            .api
            .request(
                "view_logs",
                RequestOptions::get()
                    .query("page", page)
                    .query("per_page", MUBI_PER_PAGE),
            )
            .await?
            .error_for_status()?;

        let parsed: MubiViewLogPage = response.json()?;
        let total = parsed.view_logs.len();
        let entries: Vec<ViewLogEntry> = parsed
            .view_logs
            .iter()
            .filter_map(|log| log.to_entry())
            .collect();

        if entries.len() != total {
            debug!("MUBI view log page {}: skipped {} unusable records", page, total - entries.len());
        }

        Ok(Page::new(entries))
    }

    /// Fetch the view log, newest first, down to `since` (inclusive)
    pub async fn fetch_view_log(&self, since: Option<DateTime<Utc>>) -> SourceResult<ViewLog> {
        match since {
            Some(since) => info!("Fetching view log from MUBI since {}", since),
            None => info!("Fetching view log from MUBI"),
        }

        let pages = paginate_pages(
            PageTermination::ShortPage { per_page: MUBI_PER_PAGE },
            |page| self.fetch_page(page),
        );
        futures::pin_mut!(pages);

        let mut view_log = ViewLog::new();
        let mut page_number = 0u32;
        while let Some(entries) = pages.try_next().await? {
            page_number += 1;
            let fetched = entries.len();
            let fresh: Vec<ViewLogEntry> = entries
                .into_iter()
                .filter(|entry| since.map_or(true, |since| entry.watched_at >= since))
                .collect();
            let page_is_stale = since.is_some() && fresh.is_empty();

            debug!(
                "MUBI view log page {}: {} entries, {} within range",
                page_number,
                fetched,
                fresh.len()
            );
            view_log.extend(fresh);

            if page_is_stale {
                break;
            }
        }

        info!("Fetched {} entries from MUBI", view_log.len());
        Ok(view_log)
    }
}

#[async_trait]
impl HistorySource for MubiClient {
    fn source_name(&self) -> &str {
        "mubi"
    }

    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> SourceResult<ViewLog> {
        self.fetch_view_log(since).await
    }
}
