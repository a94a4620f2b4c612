//! Administration engines: organizations, memberships, invites, projects and
//! API keys.
//!
//! `AdminService` is the single entry point. It owns the injected
//! collaborators (store, email sender, clock) and exposes the authorization
//! gate as three chained lookups:
//!
//! 1) `authenticate` resolves a session token into a `Principal`.
//! 2) `member_context` resolves the organization and the caller's membership.
//! 3) `owner_context` additionally requires the `OWNER` role.
//!
//! Each operation then takes the context type matching its minimum level, so
//! an operation cannot run without the gate having passed.

use chrono::{DateTime, TimeDelta, Utc};
use std::{fmt, sync::Arc};
use tracing::instrument;
use uuid::Uuid;

use crate::email::EmailSender;
use crate::error::{Error, Result};
use crate::gate::{self, Capability, MemberContext, OwnerContext, Principal};
use crate::secrets::hash_secret;
use crate::store::Store;

mod api_keys;
mod invites;
mod members;
mod orgs;
mod projects;

pub use api_keys::CreatedApiKey;
pub use invites::{AcceptedInvite, CreatedInvite, InvitePreview};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 80;
const DEFAULT_INVITE_TTL_HOURS: i64 = 24 * 7;
/// Longest accepted invite lifetime: one year.
pub const MAX_INVITE_TTL_HOURS: i64 = 24 * 365;
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";

/// Source of the current time; injected so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    frontend_base_url: String,
    invite_ttl: TimeDelta,
}

impl AdminConfig {
    /// Defaults: local frontend on port 3000 and a 7 day invite lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
            invite_ttl: default_invite_ttl(),
        }
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, frontend_base_url: impl Into<String>) -> Self {
        self.frontend_base_url = frontend_base_url.into();
        self
    }

    #[must_use]
    pub fn with_invite_ttl_hours(mut self, hours: i64) -> Self {
        self.invite_ttl = TimeDelta::try_hours(hours).unwrap_or_else(default_invite_ttl);
        self
    }

    /// Falls back to defaults for empty URLs and non-positive lifetimes;
    /// lifetimes beyond one year are capped.
    #[must_use]
    pub fn normalize(self) -> Self {
        let frontend_base_url = self.frontend_base_url.trim().trim_end_matches('/');
        let frontend_base_url = if frontend_base_url.is_empty() {
            DEFAULT_FRONTEND_BASE_URL.to_string()
        } else {
            frontend_base_url.to_string()
        };
        let invite_ttl = if self.invite_ttl <= TimeDelta::zero() {
            default_invite_ttl()
        } else {
            self.invite_ttl.min(TimeDelta::hours(MAX_INVITE_TTL_HOURS))
        };
        Self {
            frontend_base_url,
            invite_ttl,
        }
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn invite_ttl(&self) -> TimeDelta {
        self.invite_ttl
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_invite_ttl() -> TimeDelta {
    TimeDelta::hours(DEFAULT_INVITE_TTL_HOURS)
}

pub struct AdminService {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    config: AdminConfig,
}

impl fmt::Debug for AdminService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdminService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, email: Arc<dyn EmailSender>, config: AdminConfig) -> Self {
        Self {
            store,
            email,
            clock: Arc::new(SystemClock),
            config: config.normalize(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Storage liveness, for health checks.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolve a raw session token into a principal, if the session is live.
    ///
    /// # Errors
    /// Storage failure only; unknown or expired sessions yield `Ok(None)`.
    pub async fn identify(&self, session_token: Option<&str>) -> Result<Option<Principal>> {
        let Some(token) = session_token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        // Only the hash is stored; never compare raw tokens against storage.
        let user = self
            .store
            .find_session_user(&hash_secret(token), self.now())
            .await?;
        Ok(user.map(Principal::from))
    }

    /// Gate stage 1.
    ///
    /// # Errors
    /// `Unauthenticated` without a live session.
    pub async fn authenticate(&self, session_token: Option<&str>) -> Result<Principal> {
        gate::authenticate(self.identify(session_token).await?)
    }

    /// Gate stage 2.
    ///
    /// # Errors
    /// `NotAMember` when the organization does not exist or the caller has no
    /// membership in it; both look the same to the caller.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn member_context(&self, principal: Principal, org_id: Uuid) -> Result<MemberContext> {
        let org = self.store.find_organization(org_id).await?;
        let membership = match &org {
            Some(_) => self.store.find_membership(org_id, principal.user_id).await?,
            None => None,
        };
        gate::require_member(principal, org, membership)
    }

    /// Gate stage 3.
    ///
    /// # Errors
    /// `NotAMember` as in `member_context`, then `NotOwner`.
    pub async fn owner_context(&self, principal: Principal, org_id: Uuid) -> Result<OwnerContext> {
        gate::require_owner(self.member_context(principal, org_id).await?)
    }

    /// Widest capability the caller holds, optionally within an organization.
    ///
    /// # Errors
    /// Storage failure only.
    pub async fn capability(
        &self,
        session_token: Option<&str>,
        org_id: Option<Uuid>,
    ) -> Result<Capability> {
        let principal = self.identify(session_token).await?;
        let membership = match (&principal, org_id) {
            (Some(principal), Some(org_id)) => {
                let org = self.store.find_organization(org_id).await?;
                let member = self.store.find_membership(org_id, principal.user_id).await?;
                org.zip(member)
            }
            _ => None,
        };
        Ok(Capability::resolve(principal, membership))
    }
}

/// Trim a display name and enforce its length bounds.
fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(Error::invalid(
            "name",
            "Name must be between 2 and 80 characters.",
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests;
