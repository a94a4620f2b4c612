//! Membership and ownership rules.
//!
//! The owner is both the `OWNER` membership row and
//! `Organization::owner_user_id`; the two only ever move together through
//! `Store::transfer_ownership`.

use tracing::{info, instrument};
use uuid::Uuid;

use super::AdminService;
use crate::error::{Error, Result};
use crate::gate::{MemberContext, OwnerContext};
use crate::model::{MemberView, OrgMember, Role};
use crate::secrets::normalize_email;

impl AdminService {
    /// Members ordered by join time, oldest first.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn list_members(&self, ctx: &MemberContext) -> Result<Vec<MemberView>> {
        Ok(self.store.list_members(ctx.org_id()).await?)
    }

    /// Adds an existing user as a `MEMBER`.
    ///
    /// # Errors
    /// `UserNotFound` if no user has that email, `AlreadyMember` if they belong already.
    #[instrument(skip(self, ctx, email), fields(org_id = %ctx.org_id()))]
    pub async fn add_member(&self, ctx: &OwnerContext, email: &str) -> Result<OrgMember> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(Error::UserNotFound)?;

        if self
            .store
            .find_membership(ctx.org_id(), user.id)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyMember);
        }

        let member = OrgMember {
            id: Uuid::new_v4(),
            org_id: ctx.org_id(),
            user_id: user.id,
            role: Role::Member,
            created_at: self.now(),
        };
        self.store.insert_member(&member).await?;

        info!(user_id = %user.id, "member added");
        Ok(member)
    }

    /// Removes a non-owner member. API keys they created stay active.
    ///
    /// # Errors
    /// `CannotRemoveOwner` for the owner, `MemberNotFound` otherwise.
    #[instrument(skip(self, ctx), fields(org_id = %ctx.org_id()))]
    pub async fn remove_member(&self, ctx: &OwnerContext, user_id: Uuid) -> Result<()> {
        if user_id == ctx.org().owner_user_id {
            return Err(Error::CannotRemoveOwner);
        }
        if let Some(target) = self.store.find_membership(ctx.org_id(), user_id).await? {
            if target.role == Role::Owner {
                return Err(Error::CannotRemoveOwner);
            }
        }
        if !self.store.delete_member(ctx.org_id(), user_id).await? {
            return Err(Error::MemberNotFound);
        }

        info!("member removed");
        Ok(())
    }

    /// Changes a member's role.
    ///
    /// Granting `OWNER` is an atomic transfer: the previous owner becomes a
    /// `MEMBER` in the same transaction. Demoting the owner directly is refused.
    ///
    /// # Errors
    /// `MemberNotFound` when the target is not a member, `MustTransferFirst`
    /// when demoting the owner.
    #[instrument(skip(self, ctx), fields(org_id = %ctx.org_id()))]
    pub async fn update_member_role(
        &self,
        ctx: &OwnerContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<OrgMember> {
        let target = self
            .store
            .find_membership(ctx.org_id(), user_id)
            .await?
            .ok_or(Error::MemberNotFound)?;

        match (target.role, role) {
            (Role::Owner, Role::Owner) | (Role::Member, Role::Member) => Ok(target),
            (Role::Owner, Role::Member) => Err(Error::MustTransferFirst),
            (Role::Member, Role::Owner) => {
                let promoted = self
                    .store
                    .transfer_ownership(ctx.org_id(), user_id)
                    .await?
                    .ok_or(Error::MemberNotFound)?;
                info!(previous_owner = %ctx.user_id(), new_owner = %user_id, "ownership transferred");
                Ok(promoted)
            }
        }
    }
}
