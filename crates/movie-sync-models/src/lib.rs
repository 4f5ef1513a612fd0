pub mod auth_token;
pub mod movie;
pub mod movie_ref;
pub mod outcome;
pub mod view_log;

pub use auth_token::AuthToken;
pub use movie::Movie;
pub use movie_ref::{MovieRef, Service};
pub use outcome::SyncOutcome;
pub use view_log::{ViewLog, ViewLogEntry};
