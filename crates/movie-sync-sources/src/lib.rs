pub mod error;
pub mod http;
pub mod mubi;
pub mod traits;
pub mod trakt;

pub use error::{SourceError, SourceResult};
pub use http::{ApiClient, HttpTransport, ReqwestTransport, RetryPolicy};
pub use mubi::MubiClient;
pub use traits::{Destination, HistorySource, NotFoundMovie, SearchCandidate, SubmitReport};
pub use trakt::{DevicePrompt, TraktClient};
