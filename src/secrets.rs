//! Generation and hashing of one-time secrets (invite tokens, API keys,
//! session tokens) plus email normalization.
//!
//! Raw secrets are only handed back to the caller; storage only ever sees the
//! SHA-256 hex digest, which is also the lookup key.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

pub const API_KEY_PREFIX: &str = "mk_";
const API_KEY_BYTES: usize = 24;
const TOKEN_BYTES: usize = 32;

/// A freshly minted API key. `secret` must be shown once and then dropped.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub secret: String,
    pub hash: String,
    pub last4: String,
}

fn random_url_safe(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to read from the OS random source")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Create a new invite token for email links.
///
/// Returned token is only sent to the invitee; we store a hash in the database.
///
/// # Errors
/// Fails only when the OS random source is unavailable.
pub fn generate_invite_token() -> Result<String> {
    random_url_safe(TOKEN_BYTES).context("failed to generate invite token")
}

/// Create a new session token. Used by the authentication collaborator and tests.
///
/// # Errors
/// Fails only when the OS random source is unavailable.
pub fn generate_session_token() -> Result<String> {
    random_url_safe(TOKEN_BYTES).context("failed to generate session token")
}

/// Generate a prefixed API key along with its hash and display suffix.
///
/// # Errors
/// Fails only when the OS random source is unavailable.
pub fn generate_key() -> Result<GeneratedKey> {
    let payload = random_url_safe(API_KEY_BYTES).context("failed to generate API key")?;
    let secret = format!("{API_KEY_PREFIX}{payload}");
    let hash = hash_secret(&secret);
    let last4 = last4(&secret);
    Ok(GeneratedKey {
        secret,
        hash,
        last4,
    })
}

/// Deterministic one-way hash used for every stored secret.
#[must_use]
pub fn hash_secret(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

fn last4(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Build the frontend link that lands on the invite acceptance page.
#[must_use]
pub fn build_invite_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/invite/{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_prefix_hash_and_suffix() -> Result<()> {
        let key = generate_key()?;
        assert!(key.secret.starts_with(API_KEY_PREFIX));
        // 24 bytes encode to 32 base64url characters without padding.
        assert_eq!(key.secret.len(), API_KEY_PREFIX.len() + 32);
        assert_eq!(key.hash, hash_secret(&key.secret));
        assert!(key.secret.ends_with(&key.last4));
        assert_eq!(key.last4.chars().count(), 4);
        Ok(())
    }

    #[test]
    fn invite_tokens_are_url_safe_and_unique() -> Result<()> {
        let first = generate_invite_token()?;
        let second = generate_invite_token()?;
        assert_ne!(first, second);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        Ok(())
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" U2@X.com "), "u2@x.com");
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(valid_email("u2@x.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn build_invite_url_trims_trailing_slash() {
        assert_eq!(
            build_invite_url("https://app.monetizekit.dev/", "tok"),
            "https://app.monetizekit.dev/invite/tok"
        );
    }
}
