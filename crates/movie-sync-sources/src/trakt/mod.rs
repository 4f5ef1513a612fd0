pub mod api;
pub mod auth;
pub mod client;

pub use auth::{AuthManager, DevicePrompt, TokenState};
pub use client::TraktClient;

pub const TRAKT_API_BASE: &str = "https://api.trakt.tv/";
pub const TRAKT_API_VERSION: &str = "2";
