//! Slug generation and collision-free allocation.
//!
//! Slugs are derived from user-facing text (filenames, titles) and must be
//! unique per entity table. Allocation is a pure function over a caller
//! supplied availability check, so it can be exercised without a live store.

use thiserror::Error;

/// Maximum length of a normalized slug, before any collision suffix.
const MAX_SLUG_LEN: usize = 100;

/// Number of candidates tried before giving up: the bare slug plus the
/// suffixed forms `-2` through `-10`.
const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
pub enum SlugError<E: std::error::Error> {
    #[error("no free slug for '{basis}' after {attempts} attempts")]
    Exhausted { basis: String, attempts: usize },

    #[error("slug availability check failed: {0}")]
    Check(#[source] E),
}

/// Normalize arbitrary text into a URL-safe slug: lowercase, runs of
/// non-alphanumerics collapsed to a single hyphen, leading/trailing hyphens
/// trimmed, truncated to 100 characters. May return an empty string.
pub fn slugify(basis: &str) -> String {
    let mut slug = String::with_capacity(basis.len().min(MAX_SLUG_LEN));
    let mut pending_hyphen = false;

    for c in basis.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    slug
}

/// Allocate a unique slug derived from `basis`, using `fallback` when the
/// basis normalizes to nothing (typically the entity's own id). Candidates
/// are probed through `taken`; a positive collision appends `-2`, `-3`, ...
/// up to the attempt bound. Only collisions retry; check errors propagate
/// unchanged.
pub fn allocate<E, F>(basis: &str, fallback: &str, mut taken: F) -> Result<String, SlugError<E>>
where
    E: std::error::Error,
    F: FnMut(&str) -> Result<bool, E>,
{
    let normalized = slugify(basis);
    let base = if normalized.is_empty() {
        fallback.to_string()
    } else {
        normalized
    };

    for attempt in 0..MAX_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.clone()
        } else {
            format!("{}-{}", base, attempt + 1)
        };

        if !taken(&candidate).map_err(SlugError::Check)? {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted {
        basis: base,
        attempts: MAX_ATTEMPTS,
    })
}
