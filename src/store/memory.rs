//! In-process `Store` used by tests and local tooling.
//!
//! A single `tokio::sync::Mutex` guards all tables, so every trait call is
//! trivially atomic. Unique constraints are checked explicitly on insert and
//! reported exactly like the Postgres store reports them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AcceptOutcome, Constraint, Store, StoreError};
use crate::model::{
    ApiKey, ApiKeyScope, InviteLookup, MemberUser, MemberView, OrgInvite, OrgMember,
    OrgMembershipSummary, Organization, Project, Role, User,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    organizations: Vec<Organization>,
    members: Vec<OrgMember>,
    invites: Vec<OrgInvite>,
    projects: Vec<Project>,
    api_keys: Vec<ApiKey>,
}

impl Tables {
    fn user(&self, user_id: Uuid) -> Option<&User> {
        self.users.iter().find(|user| user.id == user_id)
    }

    fn member_index(&self, org_id: Uuid, user_id: Uuid) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.org_id == org_id && m.user_id == user_id)
    }

    fn project_org(&self, project_id: Uuid) -> Option<Uuid> {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.org_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user the way the authentication collaborator would.
    pub async fn insert_user(&self, email: &str, name: Option<&str>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            name: name.map(str::to_string),
        };
        self.tables.lock().await.users.push(user.clone());
        user
    }

    /// Stores a session by token hash, mirroring `user_sessions`.
    pub async fn insert_session(&self, token_hash: &str, user_id: Uuid, expires_at: DateTime<Utc>) {
        self.tables
            .lock()
            .await
            .sessions
            .insert(token_hash.to_string(), (user_id, expires_at));
    }

    /// Number of owner rows for an organization; used to check the single-owner invariant.
    pub async fn owner_count(&self, org_id: Uuid) -> usize {
        self.tables
            .lock()
            .await
            .members
            .iter()
            .filter(|m| m.org_id == org_id && m.role == Role::Owner)
            .count()
    }

    /// Every invite of an organization regardless of state, oldest first.
    pub async fn all_invites(&self, org_id: Uuid) -> Vec<OrgInvite> {
        self.tables
            .lock()
            .await
            .invites
            .iter()
            .filter(|i| i.org_id == org_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(token_hash)
            .filter(|(_, expires_at)| *expires_at > now)
            .and_then(|(user_id, _)| tables.user(*user_id).cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_organization(
        &self,
        org: &Organization,
        owner: &OrgMember,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.organizations.iter().any(|o| o.slug == org.slug) {
            return Err(StoreError::Conflict(Constraint::OrgSlug));
        }
        tables.organizations.push(org.clone());
        tables.members.push(owner.clone());
        Ok(())
    }

    async fn organization_slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.organizations.iter().any(|o| o.slug == slug))
    }

    async fn find_organization(&self, org_id: Uuid) -> Result<Option<Organization>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.organizations.iter().find(|o| o.id == org_id).cloned())
    }

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrgMembershipSummary>, StoreError> {
        let tables = self.tables.lock().await;
        let mut memberships: Vec<&OrgMember> = tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships
            .into_iter()
            .filter_map(|m| {
                let org = tables.organizations.iter().find(|o| o.id == m.org_id)?;
                Some(OrgMembershipSummary {
                    org_id: org.id,
                    org_name: org.name.clone(),
                    org_slug: org.slug.clone(),
                    role: m.role,
                })
            })
            .collect())
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgMember>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .member_index(org_id, user_id)
            .map(|index| tables.members[index].clone()))
    }

    async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberView>, StoreError> {
        let tables = self.tables.lock().await;
        let mut members: Vec<&OrgMember> =
            tables.members.iter().filter(|m| m.org_id == org_id).collect();
        members.sort_by_key(|m| m.created_at);
        members
            .into_iter()
            .map(|m| {
                let user = tables
                    .user(m.user_id)
                    .ok_or_else(|| StoreError::Corrupt(format!("member {} has no user", m.id)))?;
                Ok(MemberView {
                    id: m.id,
                    role: m.role,
                    created_at: m.created_at,
                    user: MemberUser {
                        id: user.id,
                        name: user.name.clone(),
                        email: user.email.clone(),
                    },
                })
            })
            .collect()
    }

    async fn insert_member(&self, member: &OrgMember) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.member_index(member.org_id, member.user_id).is_some() {
            return Err(StoreError::Conflict(Constraint::Membership));
        }
        tables.members.push(member.clone());
        Ok(())
    }

    async fn delete_member(&self, org_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.member_index(org_id, user_id) {
            Some(index) => {
                tables.members.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transfer_ownership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgMember>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(target) = tables.member_index(org_id, user_id) else {
            return Ok(None);
        };
        let Some(org) = tables.organizations.iter_mut().find(|o| o.id == org_id) else {
            return Ok(None);
        };
        org.owner_user_id = user_id;
        for member in tables
            .members
            .iter_mut()
            .filter(|m| m.org_id == org_id && m.role == Role::Owner)
        {
            member.role = Role::Member;
        }
        tables.members[target].role = Role::Owner;
        Ok(Some(tables.members[target].clone()))
    }

    async fn supersede_invites(
        &self,
        invite: &OrgInvite,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .invites
            .iter()
            .any(|i| i.token_hash == invite.token_hash)
        {
            return Err(StoreError::Conflict(Constraint::InviteToken));
        }
        let mut revoked = 0;
        for existing in tables.invites.iter_mut().filter(|i| {
            i.org_id == invite.org_id && i.email == invite.email && i.is_pending(now)
        }) {
            existing.revoked_at = Some(now);
            revoked += 1;
        }
        tables.invites.push(invite.clone());
        Ok(revoked)
    }

    async fn list_pending_invites(
        &self,
        org_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrgInvite>, StoreError> {
        let tables = self.tables.lock().await;
        // Walk newest insertions first so equal timestamps still list newest first.
        let mut invites: Vec<OrgInvite> = tables
            .invites
            .iter()
            .rev()
            .filter(|i| i.org_id == org_id && i.is_pending(now))
            .cloned()
            .collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }

    async fn revoke_invite(
        &self,
        org_id: Uuid,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<OrgInvite>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(invite) = tables.invites.iter_mut().find(|i| {
            i.id == invite_id
                && i.org_id == org_id
                && i.revoked_at.is_none()
                && i.accepted_at.is_none()
        }) else {
            return Ok(None);
        };
        invite.revoked_at = Some(now);
        Ok(Some(invite.clone()))
    }

    async fn find_invite_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<InviteLookup>, StoreError> {
        let tables = self.tables.lock().await;
        let Some(invite) = tables.invites.iter().find(|i| i.token_hash == token_hash) else {
            return Ok(None);
        };
        let org_name = tables
            .organizations
            .iter()
            .find(|o| o.id == invite.org_id)
            .map(|o| o.name.clone())
            .ok_or_else(|| StoreError::Corrupt(format!("invite {} has no org", invite.id)))?;
        let inviter_name = tables
            .user(invite.invited_by_user_id)
            .and_then(|user| user.name.clone());
        Ok(Some(InviteLookup {
            invite: invite.clone(),
            org_name,
            inviter_name,
        }))
    }

    async fn accept_invite(
        &self,
        invite: &OrgInvite,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.invites.iter_mut().find(|i| {
            i.id == invite.id && i.accepted_at.is_none() && i.revoked_at.is_none()
        }) else {
            return Ok(AcceptOutcome::Inactive);
        };
        stored.accepted_at = Some(now);

        let membership_created = tables.member_index(invite.org_id, user_id).is_none();
        if membership_created {
            tables.members.push(OrgMember {
                id: Uuid::new_v4(),
                org_id: invite.org_id,
                user_id,
                role: invite.role,
                created_at: now,
            });
        }
        Ok(AcceptOutcome::Accepted { membership_created })
    }

    async fn project_slug_taken(&self, org_id: Uuid, slug: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .projects
            .iter()
            .any(|p| p.org_id == org_id && p.slug == slug))
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .projects
            .iter()
            .any(|p| p.org_id == project.org_id && p.slug == project.slug)
        {
            return Err(StoreError::Conflict(Constraint::ProjectSlug));
        }
        tables.projects.push(project.clone());
        Ok(())
    }

    async fn list_projects(&self, org_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.lock().await;
        let mut projects: Vec<Project> = tables
            .projects
            .iter()
            .filter(|p| p.org_id == org_id)
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn find_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .projects
            .iter()
            .find(|p| p.id == project_id && p.org_id == org_id)
            .cloned())
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.api_keys.iter().any(|k| k.key_hash == key.key_hash) {
            return Err(StoreError::Conflict(Constraint::ApiKeyHash));
        }
        tables.api_keys.push(key.clone());
        Ok(())
    }

    async fn list_api_keys(&self, project_id: Uuid) -> Result<Vec<ApiKey>, StoreError> {
        let tables = self.tables.lock().await;
        let mut keys: Vec<ApiKey> = tables
            .api_keys
            .iter()
            .rev()
            .filter(|k| k.project_id == project_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn find_api_key(
        &self,
        org_id: Uuid,
        api_key_id: Uuid,
    ) -> Result<Option<ApiKey>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .api_keys
            .iter()
            .find(|k| k.id == api_key_id && tables.project_org(k.project_id) == Some(org_id))
            .cloned())
    }

    async fn revoke_api_key(
        &self,
        api_key_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKey>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(key) = tables.api_keys.iter_mut().find(|k| k.id == api_key_id) else {
            return Ok(None);
        };
        key.revoked_at.get_or_insert(now);
        Ok(Some(key.clone()))
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyScope>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash && k.revoked_at.is_none())
            .and_then(|k| {
                tables.project_org(k.project_id).map(|org_id| ApiKeyScope {
                    api_key_id: k.id,
                    project_id: k.project_id,
                    org_id,
                })
            }))
    }
}
