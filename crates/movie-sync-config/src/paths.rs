use anyhow::Result;
use std::path::{Path, PathBuf};

/// Config directory override from the environment, if set
pub fn config_dir_override() -> Option<PathBuf> {
    std::env::var("SYNC_MOVIES_CONFIG_DIR").ok().map(PathBuf::from)
}

pub struct PathManager {
    config_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("sync-movies");

        Ok(Self::with_base(base_dir))
    }

    pub fn with_base(base_dir: PathBuf) -> Self {
        Self {
            log_dir: base_dir.join("logs"),
            config_dir: base_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("sync-movies.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        if let Some(base) = config_dir_override() {
            return Self::with_base(base);
        }

        // Platform-specific paths (e.g., ~/.config/sync-movies on Linux)
        Self::new().unwrap_or_else(|_| Self::with_base(PathBuf::from(".sync-movies")))
    }
}
