pub mod api;
pub mod client;

pub use client::MubiClient;

pub const MUBI_API_BASE: &str = "https://api.mubi.com/v3/";
pub const MUBI_PER_PAGE: usize = 24;
