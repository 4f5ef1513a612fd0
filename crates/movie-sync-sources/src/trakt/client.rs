use crate::error::SourceResult;
use crate::http::{ApiClient, HttpTransport, RetryPolicy};
use crate::traits::{Destination, SearchCandidate, SubmitReport};
use crate::trakt::api;
use crate::trakt::auth::{AuthManager, DevicePrompt};
use crate::trakt::{TRAKT_API_BASE, TRAKT_API_VERSION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use movie_sync_config::{TokenStore, TraktSettings};
use movie_sync_models::{ViewLog, ViewLogEntry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

pub struct TraktClient {
    api: ApiClient,
    auth: AuthManager,
}

impl TraktClient {
    pub fn new(
        settings: &TraktSettings,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn TokenStore>,
        prompt: Arc<dyn DevicePrompt>,
    ) -> Self {
        let api = ApiClient::new(TRAKT_API_BASE, transport, &settings.language)
            .with_header("trakt-api-version", TRAKT_API_VERSION)
            .with_header("trakt-api-key", settings.client_id.clone());
        let auth = AuthManager::new(
            api.clone(),
            settings.client_id.clone(),
            settings.client_secret.clone(),
            store,
            prompt,
        );

        Self { api, auth }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.api = self.api.with_retry_policy(retry);
        self.auth.set_api(self.api.clone());
        self
    }

    /// Abandon a pending device authorization once `cancel` turns `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.auth = self.auth.with_cancellation(cancel);
        self
    }

    async fn access_token(&self) -> SourceResult<String> {
        Ok(self.auth.get_token().await?.access_token)
    }
}

#[async_trait]
impl Destination for TraktClient {
    fn destination_name(&self) -> &str {
        "trakt"
    }

    async fn authenticate(&self) -> SourceResult<()> {
        self.auth.get_token().await?;
        Ok(())
    }

    async fn fetch_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<ViewLog> {
        let token = self.access_token().await?;
        let history = api::get_watch_history(&self.api, &token, start, end).await?;
        info!("Fetched {} history entries from Trakt between {} and {}", history.len(), start, end);
        Ok(history)
    }

    async fn submit_history(&self, entries: &[ViewLogEntry]) -> SourceResult<SubmitReport> {
        if entries.is_empty() {
            return Ok(SubmitReport::default());
        }
        let token = self.access_token().await?;
        let report = api::add_watch_history(&self.api, &token, entries).await?;
        info!(
            "Submitted {} entries to Trakt: {} added, {} not found",
            entries.len(),
            report.added,
            report.not_found.len()
        );
        Ok(report)
    }

    async fn search_movie(&self, title: &str) -> SourceResult<Vec<SearchCandidate>> {
        api::search_movies(&self.api, title).await
    }
}
