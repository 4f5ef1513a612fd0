// Movie identity matching across services

use movie_sync_models::Movie;

/// Years further apart than this never match on title alone
const YEAR_TOLERANCE: u32 = 1;

/// Check if two movies share any `(service, id)` pair
pub fn match_by_any_id(a: &Movie, b: &Movie) -> bool {
    a.services()
        .iter()
        .any(|ref_a| b.services().iter().any(|ref_b| ref_a.same_identity(ref_b)))
}

/// Lowercase, then collapse runs of `:`, `-` and whitespace into one space
pub fn normalize_title(title: &str) -> String {
    let mut normalized = String::with_capacity(title.len());
    let mut in_separator = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c == ':' || c == '-' || c.is_whitespace() {
            if !in_separator {
                normalized.push(' ');
                in_separator = true;
            }
        } else {
            normalized.push(c);
            in_separator = false;
        }
    }

    normalized.trim().to_string()
}

/// Whether `a` and `b` denote the same film.
///
/// A shared service id is conclusive. Otherwise both years must be known and
/// at most one year apart, and the normalized titles must be equal.
pub fn matches(a: &Movie, b: &Movie) -> bool {
    if match_by_any_id(a, b) {
        return true;
    }

    match (a.year(), b.year()) {
        (Some(year_a), Some(year_b)) if year_a.abs_diff(year_b) <= YEAR_TOLERANCE => {}
        _ => return false,
    }

    normalize_title(a.title()) == normalize_title(b.title())
}
