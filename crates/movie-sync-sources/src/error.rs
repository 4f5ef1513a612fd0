use movie_sync_config::ConfigError;
use thiserror::Error;

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed: {status} - {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Failed to parse response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Rate limit still in effect after {attempts} attempts ({waited_secs}s waited)")]
    RateLimitExhausted { attempts: u32, waited_secs: u64 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Device code expired before authorization was completed")]
    AuthTimeout,

    #[error("Authorization cancelled")]
    AuthCancelled,

    #[error("Authorization failed: {0}")]
    AuthRejected(String),

    #[error("Credential store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    pub fn store(err: anyhow::Error) -> Self {
        SourceError::Store(err.into())
    }

    /// Missing or invalid local configuration, found before any request
    pub fn is_usage(&self) -> bool {
        matches!(self, SourceError::Config(_))
    }

    /// Device authorization did not complete
    pub fn is_auth_abandoned(&self) -> bool {
        matches!(
            self,
            SourceError::AuthTimeout | SourceError::AuthCancelled | SourceError::AuthRejected(_)
        )
    }
}
