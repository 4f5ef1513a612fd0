use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth token pair for the destination service
///
/// Always replaced as a whole: `expires_at_ms` belongs to the exact
/// access/refresh pair it was issued with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix epoch milliseconds. `None` when the server never told us.
    pub expires_at_ms: Option<i64>,
}

impl AuthToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at_ms {
            Some(expires_at_ms) => expires_at_ms <= now.timestamp_millis(),
            None => false,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at_ms.and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}
