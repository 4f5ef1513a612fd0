use anyhow::Result;
use chrono::{DateTime, Utc};
use movie_sync_models::AuthToken;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const TRAKT_ACCESS_TOKEN: &str = "trakt_access_token";
pub const TRAKT_REFRESH_TOKEN: &str = "trakt_refresh_token";
pub const TRAKT_EXPIRES_AT_MS: &str = "trakt_expires_at_ms";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Flat key/value credential file (TOML)
pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.credentials.contains_key(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    /// Stored trakt token, if an access token is present
    pub fn get_trakt_token(&self) -> Option<AuthToken> {
        let access_token = self.get(TRAKT_ACCESS_TOKEN)?.clone();
        Some(AuthToken {
            access_token,
            refresh_token: self.get(TRAKT_REFRESH_TOKEN).cloned(),
            expires_at_ms: self
                .get(TRAKT_EXPIRES_AT_MS)
                .and_then(|s| s.parse().ok()),
        })
    }

    pub fn get_trakt_token_expires(&self) -> Option<DateTime<Utc>> {
        self.get_trakt_token().and_then(|t| t.expires_at())
    }

    pub fn clear_trakt_token(&mut self) {
        self.remove(TRAKT_ACCESS_TOKEN);
        self.remove(TRAKT_REFRESH_TOKEN);
        self.remove(TRAKT_EXPIRES_AT_MS);
    }
}
