pub mod config;
pub mod credentials;
pub mod paths;
pub mod token_store;

pub use config::{
    CandidateSelection, Config, ConfigError, MubiConfig, MubiSettings, SyncConfig, TraktConfig,
    TraktSettings,
};
pub use credentials::CredentialStore;
pub use paths::{config_dir_override, PathManager};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
