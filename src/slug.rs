//! Slug validation and suggestion helpers for organizations and projects.
//!
//! `validate_slug` is the only authority on acceptance. `slugify` merely
//! proposes a slug from a display name and its output still has to pass
//! validation.

use std::fmt;

use serde::Serialize;

pub const SLUG_MIN: usize = 3;
pub const SLUG_MAX: usize = 40;

/// A slug that matched `^[a-z0-9]+(-[a-z0-9]+)*$` within the length bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidFormat {
    Length,
    Characters,
}

impl InvalidFormat {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Length => "Slug must be between 3 and 40 characters.",
            Self::Characters => "Use lowercase letters, numbers, and single hyphens only.",
        }
    }
}

/// Validates a human-chosen slug without normalizing it.
///
/// # Errors
/// Returns `InvalidFormat` for out-of-range lengths, uppercase or
/// non-alphanumeric characters, and leading, trailing or doubled hyphens.
pub fn validate_slug(candidate: &str) -> Result<Slug, InvalidFormat> {
    if candidate.len() < SLUG_MIN || candidate.len() > SLUG_MAX {
        return Err(InvalidFormat::Length);
    }
    // Every hyphen-separated segment must be a non-empty run of [a-z0-9].
    let well_formed = candidate.split('-').all(|segment| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    });
    if !well_formed {
        return Err(InvalidFormat::Characters);
    }
    Ok(Slug(candidate.to_string()))
}

/// Suggests a slug from a display name: lowercase, collapse runs of
/// non-alphanumerics into one hyphen, trim hyphens, truncate to `SLUG_MAX`.
/// The result may be shorter than `SLUG_MIN` or empty.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in input.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    let truncated: String = trimmed.chars().take(SLUG_MAX).collect();
    truncated.trim_end_matches('-').to_string()
}
