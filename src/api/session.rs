//! Session token extraction for the HTTP surface.
//!
//! The authentication collaborator issues the session; this layer only reads
//! it from `Authorization: Bearer <token>` or the session cookie and hands the
//! raw value to `AdminService::authenticate`, which hashes it before lookup.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};

pub const SESSION_COOKIE_NAME: &str = "monetizekit_session";

/// Bearer header wins over the cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        let val = val.trim();
        (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
    })
}

/// Raw bearer credential, also used for API key introspection.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
