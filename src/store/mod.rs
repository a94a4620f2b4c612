//! Storage seam for the administration engines.
//!
//! `Store` is expressed in terms of whole domain steps rather than raw rows so
//! every multi-row change (organization bootstrap, ownership transfer, invite
//! supersession, invite acceptance) is a single atomic call. Implementations
//! must enforce the unique constraints listed in `Constraint` and report
//! violations as `StoreError::Conflict`; the engines' own existence checks only
//! exist to produce friendlier errors.
//!
//! Two implementations ship with the crate:
//! - `PgStore`: `sqlx` over Postgres, schema in `sql/schema.sql`.
//! - `MemoryStore`: a mutex-guarded in-process store with identical semantics,
//!   used by tests and local tooling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    ApiKey, ApiKeyScope, InviteLookup, MemberView, OrgInvite, OrgMember, OrgMembershipSummary,
    Organization, Project, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Unique constraints that act as the final arbiter for concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    OrgSlug,
    ProjectSlug,
    Membership,
    InviteToken,
    ApiKeyHash,
    SingleOwner,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    Conflict(Constraint),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Result of the atomic accept step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The invite was stamped; `membership_created` is false when the user
    /// already belonged to the organization.
    Accepted { membership_created: bool },
    /// Another request accepted or revoked the invite first.
    Inactive,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    // Identity collaborator tables (read-only for the core).

    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;


    /// Case-insensitive lookup; `email` is expected to be normalized already.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    // Organizations and memberships.

    /// Inserts the organization and its owner membership in one transaction.
    async fn insert_organization(
        &self,
        org: &Organization,
        owner: &OrgMember,
    ) -> Result<(), StoreError>;

    async fn organization_slug_taken(&self, slug: &str) -> Result<bool, StoreError>;

    async fn find_organization(&self, org_id: Uuid) -> Result<Option<Organization>, StoreError>;

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrgMembershipSummary>, StoreError>;

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgMember>, StoreError>;

    /// Members joined with user fields, oldest membership first.
    async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberView>, StoreError>;

    async fn insert_member(&self, member: &OrgMember) -> Result<(), StoreError>;

    /// Returns `false` when no membership row existed.
    async fn delete_member(&self, org_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Demotes every owner row, promotes `user_id`, and repoints
    /// `owner_user_id`, all in one transaction. `None` if the target is not a member.
    async fn transfer_ownership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgMember>, StoreError>;

    // Invites.

    /// Revokes every pending invite for `(invite.org_id, invite.email)` and
    /// inserts `invite`, in one transaction. Returns how many were revoked.
    async fn supersede_invites(
        &self,
        invite: &OrgInvite,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Pending invites only, newest first.
    async fn list_pending_invites(
        &self,
        org_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrgInvite>, StoreError>;

    /// Stamps `revoked_at` on an unrevoked, unaccepted invite of the org.
    async fn revoke_invite(
        &self,
        org_id: Uuid,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<OrgInvite>, StoreError>;

    async fn find_invite_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<InviteLookup>, StoreError>;

    /// Stamps `accepted_at` (only while still unaccepted and unrevoked) and
    /// creates the membership unless it exists, in one transaction.
    async fn accept_invite(
        &self,
        invite: &OrgInvite,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, StoreError>;

    // Projects.

    async fn project_slug_taken(&self, org_id: Uuid, slug: &str) -> Result<bool, StoreError>;

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError>;

    /// Oldest first.
    async fn list_projects(&self, org_id: Uuid) -> Result<Vec<Project>, StoreError>;

    async fn find_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, StoreError>;

    // API keys.

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_api_keys(&self, project_id: Uuid) -> Result<Vec<ApiKey>, StoreError>;

    /// Looks a key up through its project so it can never cross org boundaries.
    async fn find_api_key(
        &self,
        org_id: Uuid,
        api_key_id: Uuid,
    ) -> Result<Option<ApiKey>, StoreError>;

    /// Sets `revoked_at` only if it is still empty and returns the stored row.
    async fn revoke_api_key(
        &self,
        api_key_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKey>, StoreError>;

    /// Resolves an unrevoked key by hash.
    async fn find_active_api_key(&self, key_hash: &str)
        -> Result<Option<ApiKeyScope>, StoreError>;
}
