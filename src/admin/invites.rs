//! Invite lifecycle: create (superseding older pending invites), list,
//! revoke, preview and accept.
//!
//! The raw token only exists in the create response and the emailed URL;
//! every later lookup hashes the presented token first. Expiry is derived
//! from the clock at read time and never written.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::AdminService;
use crate::email::InviteEmail;
use crate::error::{Error, Result};
use crate::gate::{OwnerContext, Principal};
use crate::model::{InviteState, InviteSummary, OrgInvite, Role};
use crate::secrets::{
    build_invite_url, generate_invite_token, hash_secret, normalize_email, valid_email,
};
use crate::store::AcceptOutcome;

/// Returned once to the owner who created the invite.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CreatedInvite {
    pub invite: InviteSummary,
    pub token: String,
    pub invite_url: String,
}

/// What the invite landing page renders before the user accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct InvitePreview {
    pub org_name: String,
    pub inviter_name: Option<String>,
    pub email: String,
    pub state: InviteState,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AcceptedInvite {
    pub org_id: Uuid,
    pub role: Role,
    pub membership_created: bool,
}

impl AdminService {
    /// Invites an email address as a `MEMBER`.
    ///
    /// Pending invites for the same `(org, email)` are revoked in the same
    /// transaction that inserts the new one. The email is sent after commit
    /// and a delivery failure is only logged.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed email, `AlreadyMember` if the address
    /// belongs to a member.
    #[instrument(skip(self, ctx, email), fields(org_id = %ctx.org_id()))]
    pub async fn create_invite(&self, ctx: &OwnerContext, email: &str) -> Result<CreatedInvite> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(Error::invalid("email", "Enter a valid email address."));
        }

        if let Some(user) = self.store.find_user_by_email(&email).await? {
            if self
                .store
                .find_membership(ctx.org_id(), user.id)
                .await?
                .is_some()
            {
                return Err(Error::AlreadyMember);
            }
        }

        let token = generate_invite_token()?;
        let now = self.now();
        let expires_at = now
            .checked_add_signed(self.config.invite_ttl())
            .ok_or_else(|| anyhow!("invite expiry overflows the calendar"))?;
        let invite = OrgInvite {
            id: Uuid::new_v4(),
            org_id: ctx.org_id(),
            email,
            role: Role::Member,
            token_hash: hash_secret(&token),
            expires_at,
            accepted_at: None,
            revoked_at: None,
            invited_by_user_id: ctx.user_id(),
            created_at: now,
        };
        let superseded = self.store.supersede_invites(&invite, now).await?;
        info!(invite_id = %invite.id, superseded, "invite created");

        let invite_url = build_invite_url(self.config.frontend_base_url(), &token);
        let message = InviteEmail {
            to_email: invite.email.clone(),
            org_name: ctx.org().name.clone(),
            invite_url: invite_url.clone(),
            inviter_name: ctx.principal().name.clone(),
        };
        if let Err(err) = self.email.send_invite(&message) {
            warn!(invite_id = %invite.id, "Failed to send invite email: {err:#}");
        }

        Ok(CreatedInvite {
            invite: invite.summary(),
            token,
            invite_url,
        })
    }

    /// Pending invites, newest first.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn list_invites(&self, ctx: &OwnerContext) -> Result<Vec<InviteSummary>> {
        let invites = self
            .store
            .list_pending_invites(ctx.org_id(), self.now())
            .await?;
        Ok(invites.iter().map(OrgInvite::summary).collect())
    }

    /// Revokes an invite that was neither revoked nor accepted yet. Expired
    /// invites can still be revoked.
    ///
    /// # Errors
    /// `InviteNotFound` for unknown ids, other orgs, and terminal invites.
    #[instrument(skip(self, ctx), fields(org_id = %ctx.org_id()))]
    pub async fn revoke_invite(&self, ctx: &OwnerContext, invite_id: Uuid) -> Result<InviteSummary> {
        let invite = self
            .store
            .revoke_invite(ctx.org_id(), invite_id, self.now())
            .await?
            .ok_or(Error::InviteNotFound)?;
        info!("invite revoked");
        Ok(invite.summary())
    }

    /// Landing page data for a raw token; needs no session.
    ///
    /// # Errors
    /// `InviteNotFound` for unknown tokens.
    pub async fn preview_invite(&self, token: &str) -> Result<InvitePreview> {
        let lookup = self
            .store
            .find_invite_by_token_hash(&hash_secret(token.trim()))
            .await?
            .ok_or(Error::InviteNotFound)?;
        Ok(InvitePreview {
            state: lookup.invite.state(self.now()),
            org_name: lookup.org_name,
            inviter_name: lookup.inviter_name,
            email: lookup.invite.email,
            expires_at: lookup.invite.expires_at,
        })
    }

    /// Consumes an invite for the signed-in user.
    ///
    /// Checks run in order: existence, terminal state, expiry, then the
    /// session email. The accept step itself is guarded so a concurrent
    /// acceptor loses with `InviteInactive` and no second membership appears.
    ///
    /// # Errors
    /// `InviteNotFound`, `InviteInactive`, `InviteExpired`, `EmailMismatch`.
    #[instrument(skip(self, principal, token), fields(user_id = %principal.user_id))]
    pub async fn accept_invite(&self, principal: &Principal, token: &str) -> Result<AcceptedInvite> {
        let lookup = self
            .store
            .find_invite_by_token_hash(&hash_secret(token.trim()))
            .await?
            .ok_or(Error::InviteNotFound)?;
        let invite = lookup.invite;

        let now = self.now();
        match invite.state(now) {
            InviteState::Accepted | InviteState::Revoked => return Err(Error::InviteInactive),
            InviteState::Expired => return Err(Error::InviteExpired),
            InviteState::Pending => {}
        }
        if normalize_email(&principal.email) != invite.email {
            return Err(Error::EmailMismatch);
        }

        match self
            .store
            .accept_invite(&invite, principal.user_id, now)
            .await?
        {
            AcceptOutcome::Accepted { membership_created } => {
                info!(invite_id = %invite.id, org_id = %invite.org_id, membership_created, "invite accepted");
                Ok(AcceptedInvite {
                    org_id: invite.org_id,
                    role: invite.role,
                    membership_created,
                })
            }
            AcceptOutcome::Inactive => Err(Error::InviteInactive),
        }
    }
}
