use serde::{Deserialize, Serialize};
use std::fmt;

/// Services a movie can be identified by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// The read-only source of watch history
    Mubi,
    /// The destination's native catalog
    Trakt,
    Tmdb,
    Imdb,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Mubi => "mubi",
            Service::Trakt => "trakt",
            Service::Tmdb => "tmdb",
            Service::Imdb => "imdb",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external identifier for a movie
///
/// Two refs denote the same catalog entry when `service` and `id` are equal;
/// `url` is informational and only used when reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MovieRef {
    pub service: Service,
    pub id: String,
    pub url: String,
}

impl MovieRef {
    pub fn new(service: Service, id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            service,
            id: id.into(),
            url: url.into(),
        }
    }

    pub fn mubi(id: u64, web_url: impl Into<String>) -> Self {
        Self::new(Service::Mubi, id.to_string(), web_url)
    }

    /// Trakt movie pages are addressed by slug, falling back to the numeric id
    pub fn trakt(id: u64, slug: Option<&str>) -> Self {
        let path = slug.map(str::to_string).unwrap_or_else(|| id.to_string());
        Self::new(
            Service::Trakt,
            id.to_string(),
            format!("https://trakt.tv/movies/{}", path),
        )
    }

    pub fn tmdb(id: u64) -> Self {
        Self::new(
            Service::Tmdb,
            id.to_string(),
            format!("https://www.themoviedb.org/movie/{}", id),
        )
    }

    pub fn imdb(id: &str) -> Self {
        // Trakt sometimes returns IMDB ids with stray slashes
        let id = id.replace('/', "");
        let url = format!("https://www.imdb.com/title/{}", id);
        Self::new(Service::Imdb, id, url)
    }

    /// Whether both refs point at the same catalog entry
    pub fn same_identity(&self, other: &MovieRef) -> bool {
        self.service == other.service && self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_identity_ignores_url() {
        let a = MovieRef::new(Service::Tmdb, "194", "https://example.com/a");
        let b = MovieRef::new(Service::Tmdb, "194", "https://example.com/b");
        assert!(a.same_identity(&b));
    }

    #[test]
    fn test_same_identity_requires_same_service() {
        let a = MovieRef::new(Service::Tmdb, "42", "");
        let b = MovieRef::new(Service::Mubi, "42", "");
        assert!(!a.same_identity(&b));
    }

    #[test]
    fn test_imdb_strips_slashes() {
        let r = MovieRef::imdb("/tt0211915/");
        assert_eq!(r.id, "tt0211915");
        assert_eq!(r.url, "https://www.imdb.com/title/tt0211915");
    }

    #[test]
    fn test_trakt_url_prefers_slug() {
        assert_eq!(
            MovieRef::trakt(120, Some("amelie-2001")).url,
            "https://trakt.tv/movies/amelie-2001"
        );
        assert_eq!(MovieRef::trakt(120, None).url, "https://trakt.tv/movies/120");
    }

    #[test]
    fn test_service_serializes_lowercase() {
        let json = serde_json::to_string(&Service::Trakt).unwrap();
        assert_eq!(json, "\"trakt\"");
    }
}
