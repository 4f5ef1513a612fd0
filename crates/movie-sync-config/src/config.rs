use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

const PLACEHOLDERS: [&str; 2] = ["YOUR_CLIENT_ID", "YOUR_CLIENT_SECRET"];

/// Errors raised while turning configuration into component settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required setting {0} missing")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sent as `Accept-Language` to both services
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub mubi: MubiConfig,
    #[serde(default)]
    pub trakt: TraktConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MubiConfig {
    /// Bearer token taken from the `Authorization` header of mubi.com web requests
    pub token: Option<String>,
    /// Value of the `Client-Country` header of mubi.com web requests
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraktConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of title lookups in flight at once
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
    #[serde(default)]
    pub candidate_selection: CandidateSelection,
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
}

/// Which qualifying search result a title lookup settles on
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSelection {
    #[default]
    HighestScore,
    LowestScore,
}

/// The slice of configuration the MUBI fetcher needs
#[derive(Debug, Clone)]
pub struct MubiSettings {
    pub token: String,
    pub country: String,
    pub language: String,
}

/// The slice of configuration the trakt client needs
#[derive(Debug, Clone)]
pub struct TraktSettings {
    pub client_id: String,
    pub client_secret: String,
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_lookup_concurrency() -> usize {
    4
}

fn default_max_rate_limit_retries() -> u32 {
    5
}

fn default_max_rate_limit_wait_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: default_language(),
            mubi: MubiConfig::default(),
            trakt: TraktConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookup_concurrency: default_lookup_concurrency(),
            candidate_selection: CandidateSelection::default(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
        }
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() && !PLACEHOLDERS.contains(&v) => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path`, or the defaults when the file does not exist yet
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "language",
                reason: "must not be empty".to_string(),
            });
        }
        if self.sync.lookup_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "sync.lookup_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sync.max_rate_limit_retries == 0 {
            return Err(ConfigError::Invalid {
                name: "sync.max_rate_limit_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn mubi_settings(&self) -> Result<MubiSettings, ConfigError> {
        Ok(MubiSettings {
            token: required(&self.mubi.token, "mubi-token")?,
            country: required(&self.mubi.country, "mubi-country")?,
            language: self.language.clone(),
        })
    }

    pub fn trakt_settings(&self) -> Result<TraktSettings, ConfigError> {
        Ok(TraktSettings {
            client_id: required(&self.trakt.client_id, "trakt-client-id")?,
            client_secret: required(&self.trakt.client_secret, "trakt-client-secret")?,
            language: self.language.clone(),
        })
    }

    pub fn is_trakt_configured(&self) -> bool {
        self.trakt_settings().is_ok()
    }

    pub fn is_mubi_configured(&self) -> bool {
        self.mubi_settings().is_ok()
    }
}
