//! Domain records shared by the engines, the stores and the HTTP layer.
//!
//! Records holding secret hashes (`OrgInvite`, `ApiKey`) are never serialized
//! directly; the HTTP layer uses the summary types that omit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Organization role. Exactly one member per organization holds `Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Member,
}

impl Role {
    /// Returns the canonical representation used in API payloads and SQL writes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Member => "MEMBER",
        }
    }

    /// Parses the stored representation; unknown values yield `None`.
    #[must_use]
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "OWNER" => Some(Self::Owner),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrgMember {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MemberUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

/// Membership joined with the public user fields, as listed to org members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MemberView {
    pub id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub user: MemberUser,
}

/// One entry of the caller's organization switcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrgMembershipSummary {
    pub org_id: Uuid,
    pub org_name: String,
    pub org_slug: String,
    pub role: Role,
}

/// Derived invite state. `Expired` is computed from the clock, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Pending,
    Accepted,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgInvite {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub invited_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl OrgInvite {
    /// Terminal stamps win over the clock; an accepted invite never reads as expired.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> InviteState {
        if self.accepted_at.is_some() {
            InviteState::Accepted
        } else if self.revoked_at.is_some() {
            InviteState::Revoked
        } else if self.expires_at <= now {
            InviteState::Expired
        } else {
            InviteState::Pending
        }
    }

    #[must_use]
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == InviteState::Pending
    }

    #[must_use]
    pub fn summary(&self) -> InviteSummary {
        InviteSummary {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            expires_at: self.expires_at,
            invited_by_user_id: self.invited_by_user_id,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct InviteSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub invited_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Invite looked up by token hash together with what the landing page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteLookup {
    pub invite: OrgInvite,
    pub org_name: String,
    pub inviter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_by_user_id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub key_last4: String,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    #[must_use]
    pub fn summary(&self) -> ApiKeySummary {
        ApiKeySummary {
            id: self.id,
            name: self.name.clone(),
            key_last4: self.key_last4.clone(),
            created_at: self.created_at,
            revoked_at: self.revoked_at,
        }
    }
}

/// API key fields that are safe to show after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub name: String,
    pub key_last4: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// What an unrevoked API key grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApiKeyScope {
    pub api_key_id: Uuid,
    pub project_id: Uuid,
    pub org_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(now: DateTime<Utc>) -> OrgInvite {
        OrgInvite {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            email: "u2@x.com".to_string(),
            role: Role::Member,
            token_hash: "hash".to_string(),
            expires_at: now + Duration::days(7),
            accepted_at: None,
            revoked_at: None,
            invited_by_user_id: Uuid::new_v4(),
            created_at: now,
        }
    }

    #[test]
    fn role_round_trips_through_storage_form() {
        for role in [Role::Owner, Role::Member] {
            assert_eq!(Role::from_db(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_db("ADMIN"), None);
    }

    #[test]
    fn invite_state_is_derived_from_stamps_then_clock() {
        let now = Utc::now();
        let mut record = invite(now);
        assert_eq!(record.state(now), InviteState::Pending);
        assert_eq!(record.state(now + Duration::days(7)), InviteState::Expired);

        record.revoked_at = Some(now);
        assert_eq!(record.state(now), InviteState::Revoked);

        record.revoked_at = None;
        record.accepted_at = Some(now);
        assert_eq!(record.state(now + Duration::days(30)), InviteState::Accepted);
    }
}
