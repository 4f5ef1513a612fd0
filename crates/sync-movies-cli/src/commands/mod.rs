pub mod config;
pub mod logout;
pub mod progress;
pub mod prompts;
pub mod sync;
