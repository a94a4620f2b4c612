//! # MonetizeKit (Organization Administration Core)
//!
//! `monetizekit` owns the tenant administration rules: organizations, their
//! members and roles, time-limited email invites, projects, and project-scoped
//! API keys.
//!
//! ## Tenant Model
//!
//! Organizations are the tenant boundary. Each organization owns its members,
//! invites and projects; each project owns its API keys. Nothing is shared
//! across organizations.
//!
//! - **Single owner:** exactly one membership carries the `OWNER` role and its
//!   user id always equals `Organization::owner_user_id`. Ownership only moves
//!   through an atomic transfer.
//! - **Slugs:** organization and project slugs are lowercase kebab-case,
//!   3 to 40 characters, and validated server-side regardless of any suggestion.
//! - **Secrets:** invite tokens and API keys are returned exactly once; only
//!   their SHA-256 hashes are stored and all lookups go through the hash.
//!
//! ## Authorization
//!
//! Every operation declares a minimum capability: authenticated, org member, or
//! org owner. The gate is evaluated in that order before any domain logic runs,
//! and each stage returns a richer context value that the operation receives.

pub mod admin;
pub mod api;
pub mod cli;
pub mod email;
pub mod error;
pub mod gate;
pub mod model;
pub mod secrets;
pub mod slug;
pub mod store;

pub use admin::{AdminConfig, AdminService, Clock, SystemClock};
pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
