use crate::error::{SourceError, SourceResult};
use crate::http::{ApiClient, HttpResponse, RequestOptions};
use chrono::{DateTime, Utc};
use movie_sync_config::credentials::{TRAKT_ACCESS_TOKEN, TRAKT_EXPIRES_AT_MS, TRAKT_REFRESH_TOKEN};
use movie_sync_config::TokenStore;
use movie_sync_models::AuthToken;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Upper bound on how long a device code is waited for, whatever the server claims
const MAX_DEVICE_CODE_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the stored token stands before any network call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    HasValidToken(AuthToken),
    Expired(AuthToken),
}

impl TokenState {
    pub fn of(token: Option<AuthToken>, now: DateTime<Utc>) -> Self {
        match token {
            None => TokenState::NoToken,
            Some(token) if token.is_expired_at(now) => TokenState::Expired(token),
            Some(token) => TokenState::HasValidToken(token),
        }
    }
}

/// Shows the operator what to do during device authorization
pub trait DevicePrompt: Send + Sync {
    /// Ask the operator to enter `user_code` at `verification_url`
    fn show_code(&self, verification_url: &str, user_code: &str, expires_in: Duration);

    fn authenticated(&self) {}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    /// Seconds
    expires_in: Option<i64>,
    /// Unix epoch seconds
    created_at: Option<i64>,
}

impl TokenResponse {
    fn into_token(self) -> AuthToken {
        let created_at = self.created_at.unwrap_or_else(|| Utc::now().timestamp());
        AuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at_ms: self
                .expires_in
                .map(|expires_in| (created_at + expires_in) * 1000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCode {
    device_code: String,
    user_code: String,
    verification_url: String,
    /// Seconds
    expires_in: u64,
    /// Seconds
    interval: u64,
}

/// Keeps a usable trakt access token around.
///
/// A stored token that has not expired is used as is. An expired one is
/// refreshed when it came with a refresh token, and device authorization is
/// the fallback for everything else. New tokens are persisted before they
/// are handed out.
pub struct AuthManager {
    api: ApiClient,
    client_id: String,
    client_secret: String,
    store: Arc<dyn TokenStore>,
    prompt: Arc<dyn DevicePrompt>,
    cancel: Option<watch::Receiver<bool>>,
}

impl AuthManager {
    pub fn new(
        api: ApiClient,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        store: Arc<dyn TokenStore>,
        prompt: Arc<dyn DevicePrompt>,
    ) -> Self {
        Self {
            api,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            store,
            prompt,
            cancel: None,
        }
    }

    /// Abandon device authorization once `cancel` turns `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn set_api(&mut self, api: ApiClient) {
        self.api = api;
    }

    async fn stored_token(&self) -> SourceResult<Option<AuthToken>> {
        let Some(access_token) = self.store.get(TRAKT_ACCESS_TOKEN).await.map_err(SourceError::store)? else {
            return Ok(None);
        };
        let refresh_token = self.store.get(TRAKT_REFRESH_TOKEN).await.map_err(SourceError::store)?;
        let expires_at_ms = self
            .store
            .get(TRAKT_EXPIRES_AT_MS)
            .await
            .map_err(SourceError::store)?
            .and_then(|v| v.parse().ok());

        Ok(Some(AuthToken {
            access_token,
            refresh_token,
            expires_at_ms,
        }))
    }

    async fn persist(&self, token: &AuthToken) -> SourceResult<()> {
        self.store
            .set_all(vec![
                (TRAKT_ACCESS_TOKEN.to_string(), Some(token.access_token.clone())),
                (TRAKT_REFRESH_TOKEN.to_string(), token.refresh_token.clone()),
                (
                    TRAKT_EXPIRES_AT_MS.to_string(),
                    token.expires_at_ms.map(|ms| ms.to_string()),
                ),
            ])
            .await
            .map_err(SourceError::store)
    }

    /// A token that is valid right now, authorizing if needed
    pub async fn get_token(&self) -> SourceResult<AuthToken> {
        let state = TokenState::of(self.stored_token().await?, Utc::now());

        let token = match state {
            TokenState::HasValidToken(token) => {
                debug!("Using saved Trakt access token");
                return Ok(token);
            }
            TokenState::Expired(expired) => {
                info!("Trakt access token expired, refreshing");
                let refreshed = match expired.refresh_token.as_deref() {
                    Some(refresh_token) => self.refresh(refresh_token).await?,
                    None => None,
                };
                match refreshed {
                    Some(token) => token,
                    None => self.device_flow().await?,
                }
            }
            TokenState::NoToken => self.device_flow().await?,
        };

        self.persist(&token).await?;
        info!("Authenticated to Trakt");
        Ok(token)
    }

    /// `None` when trakt refused the refresh token
    async fn refresh(&self, refresh_token: &str) -> SourceResult<Option<AuthToken>> {
        let body = json!({
            "refresh_token": refresh_token,
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "redirect_uri": REDIRECT_URI,
            "grant_type": "refresh_token",
        });

        let response = self
            .api
            .request("oauth/token", RequestOptions::post(body))
            .await?;

        if !response.is_success() {
            warn!(
                "Token refresh failed ({}): {}",
                response.status,
                error_description(&response)
            );
            return Ok(None);
        }

        let token: TokenResponse = response.json()?;
        Ok(Some(token.into_token()))
    }

    async fn device_flow(&self) -> SourceResult<AuthToken> {
        let code: DeviceCode = self
            .api
            .request(
                "oauth/device/code",
                RequestOptions::post(json!({ "client_id": self.client_id })),
            )
            .await?
            .error_for_status()?
            .json()?;

        let expires_in = Duration::from_secs(code.expires_in).min(MAX_DEVICE_CODE_LIFETIME);
        self.prompt
            .show_code(&code.verification_url, &code.user_code, expires_in);

        let deadline = Instant::now() + expires_in;
        let mut interval = Duration::from_secs(code.interval.max(1)).min(expires_in);

        loop {
            self.pause(interval).await?;
            if Instant::now() >= deadline {
                return Err(SourceError::AuthTimeout);
            }

            let response = self
                .api
                .request(
                    "oauth/device/token",
                    RequestOptions::post(json!({
                        "code": code.device_code,
                        "client_id": self.client_id,
                        "client_secret": self.client_secret,
                    })),
                )
                .await?;

            match response.status {
                200..=299 => {
                    let token: TokenResponse = response.json()?;
                    self.prompt.authenticated();
                    return Ok(token.into_token());
                }
                // Pending
                400 => debug!("Waiting for device authorization"),
                // Slow down
                429 => {
                    interval = interval.saturating_add(Duration::from_secs(1));
                    debug!("Polling too fast, interval now {}s", interval.as_secs());
                }
                404 => return Err(SourceError::AuthRejected("invalid device code".to_string())),
                409 => return Err(SourceError::AuthRejected("code already used".to_string())),
                410 => return Err(SourceError::AuthTimeout),
                418 => return Err(SourceError::AuthRejected("denied by user".to_string())),
                _ => {
                    response.error_for_status()?;
                }
            }
        }
    }

    /// Sleep for `delay`, returning early with `AuthCancelled` on cancellation
    async fn pause(&self, delay: Duration) -> SourceResult<()> {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(delay).await;
            return Ok(());
        };

        let mut cancel = cancel.clone();
        if *cancel.borrow_and_update() {
            return Err(SourceError::AuthCancelled);
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                changed = cancel.changed() => match changed {
                    Ok(()) if *cancel.borrow_and_update() => return Err(SourceError::AuthCancelled),
                    Ok(()) => {}
                    // Sender gone, nobody can cancel any more
                    Err(_) => {
                        (&mut sleep).await;
                        return Ok(());
                    }
                },
            }
        }
    }
}

fn error_description(response: &HttpResponse) -> String {
    serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|v| v.get("error_description")?.as_str().map(str::to_string))
        .unwrap_or_else(|| response.body.clone())
}
