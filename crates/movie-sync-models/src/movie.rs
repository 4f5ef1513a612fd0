use serde::Serialize;
use crate::movie_ref::{MovieRef, Service};

/// A film as seen by one or more services
///
/// Values are never mutated after construction. Enrichment with refs found on
/// another service produces a new `Movie` through [`Movie::enriched_with`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Movie {
    title: String,
    year: Option<u32>,
    services: Vec<MovieRef>,
}

impl Movie {
    /// Build a movie from its refs, keeping the first ref per `(service, id)`.
    ///
    /// Returns `None` when no ref is given: every movie must be addressable
    /// on at least one service.
    pub fn new(
        title: impl Into<String>,
        year: Option<u32>,
        refs: impl IntoIterator<Item = MovieRef>,
    ) -> Option<Self> {
        let mut services: Vec<MovieRef> = Vec::new();
        for r in refs {
            if !services.iter().any(|existing| existing.same_identity(&r)) {
                services.push(r);
            }
        }

        if services.is_empty() {
            return None;
        }

        Some(Self {
            title: title.into(),
            year,
            services,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn year(&self) -> Option<u32> {
        self.year
    }

    pub fn services(&self) -> &[MovieRef] {
        &self.services
    }

    /// First id this movie has on `service`
    pub fn id_for(&self, service: Service) -> Option<&str> {
        self.services
            .iter()
            .find(|r| r.service == service)
            .map(|r| r.id.as_str())
    }

    /// A copy of `found` that also carries every ref of `self`.
    ///
    /// Title and year come from `found`, which is the catalog entry the
    /// destination knows; the refs of `self` are appended so the origin of the
    /// entry is never lost.
    pub fn enriched_with(&self, found: &Movie) -> Movie {
        let mut services = found.services.clone();
        for r in &self.services {
            if !services.iter().any(|existing| existing.same_identity(r)) {
                services.push(r.clone());
            }
        }

        Movie {
            title: found.title.clone(),
            year: found.year,
            services,
        }
    }
}
