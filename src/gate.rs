//! Authorization gate.
//!
//! Every operation declares the minimum capability it needs by the context
//! type it accepts: `Principal` (authenticated), `MemberContext` (org member)
//! or `OwnerContext` (org owner). Each context can only be built from the
//! previous one, so the stages always run Authenticated -> OrgMember ->
//! OrgOwner and the first failing stage decides the error.
//!
//! The functions here are pure; `AdminService` performs the lookups and feeds
//! the results in.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{OrgMember, Organization, Role, User};

/// Authenticated user context derived from a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// A principal with a membership in `org`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberContext {
    principal: Principal,
    org: Organization,
    role: Role,
}

impl MemberContext {
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn org(&self) -> &Organization {
        &self.org
    }

    #[must_use]
    pub fn org_id(&self) -> Uuid {
        self.org.id
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.principal.user_id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

/// A member whose role is `Owner`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerContext(MemberContext);

impl OwnerContext {
    #[must_use]
    pub fn member(&self) -> &MemberContext {
        &self.0
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        self.0.principal()
    }

    #[must_use]
    pub fn org(&self) -> &Organization {
        self.0.org()
    }

    #[must_use]
    pub fn org_id(&self) -> Uuid {
        self.0.org_id()
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.0.user_id()
    }
}

/// Ordered authorization levels; `Ord` follows the gate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Anonymous,
    Authenticated,
    OrgMember,
    OrgOwner,
}

/// The widest context a caller reached, carrying everything earned so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    Anonymous,
    Authenticated(Principal),
    OrgMember(MemberContext),
    OrgOwner(OwnerContext),
}

impl Capability {
    /// Runs every stage that the inputs allow and stops at the first failure.
    #[must_use]
    pub fn resolve(
        principal: Option<Principal>,
        membership: Option<(Organization, OrgMember)>,
    ) -> Self {
        let Ok(principal) = authenticate(principal) else {
            return Self::Anonymous;
        };
        let (org, member) = match membership {
            Some((org, member)) => (Some(org), Some(member)),
            None => (None, None),
        };
        let member = match require_member(principal.clone(), org, member) {
            Ok(member) => member,
            Err(_) => return Self::Authenticated(principal),
        };
        match require_owner(member.clone()) {
            Ok(owner) => Self::OrgOwner(owner),
            Err(_) => Self::OrgMember(member),
        }
    }

    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Anonymous => Level::Anonymous,
            Self::Authenticated(_) => Level::Authenticated,
            Self::OrgMember(_) => Level::OrgMember,
            Self::OrgOwner(_) => Level::OrgOwner,
        }
    }

    /// Checks that `required` was reached, reporting the first stage that failed.
    ///
    /// # Errors
    /// `Unauthenticated`, `NotAMember` or `NotOwner`, in gate order.
    pub fn require(&self, required: Level) -> Result<()> {
        let reached = self.level();
        if reached >= required {
            return Ok(());
        }
        Err(match reached {
            Level::Anonymous => Error::Unauthenticated,
            Level::Authenticated => Error::NotAMember,
            Level::OrgMember | Level::OrgOwner => Error::NotOwner,
        })
    }
}

/// Stage 1: a resolved session.
///
/// # Errors
/// `Unauthenticated` when no principal was resolved.
pub fn authenticate(principal: Option<Principal>) -> Result<Principal> {
    principal.ok_or(Error::Unauthenticated)
}

/// Stage 2: a membership row for `(org, principal)`.
///
/// # Errors
/// `NotAMember` when the organization or membership is missing, or the row
/// belongs to another user or organization.
pub fn require_member(
    principal: Principal,
    org: Option<Organization>,
    membership: Option<OrgMember>,
) -> Result<MemberContext> {
    match (org, membership) {
        (Some(org), Some(member))
            if member.org_id == org.id && member.user_id == principal.user_id =>
        {
            Ok(MemberContext {
                principal,
                org,
                role: member.role,
            })
        }
        _ => Err(Error::NotAMember),
    }
}

/// Stage 3: the member holds `Owner`.
///
/// # Errors
/// `NotOwner` for any other role.
pub fn require_owner(member: MemberContext) -> Result<OwnerContext> {
    if member.role == Role::Owner {
        Ok(OwnerContext(member))
    } else {
        Err(Error::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn principal() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "u1@x.com".to_string(),
            name: Some("U1".to_string()),
        }
    }

    fn membership(principal: &Principal, role: Role) -> (Organization, OrgMember) {
        let org = Organization {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            owner_user_id: principal.user_id,
            created_at: Utc::now(),
        };
        let member = OrgMember {
            id: Uuid::new_v4(),
            org_id: org.id,
            user_id: principal.user_id,
            role,
            created_at: Utc::now(),
        };
        (org, member)
    }

    #[test]
    fn anonymous_fails_every_stage_with_unauthenticated() {
        let capability = Capability::resolve(None, None);
        assert_eq!(capability, Capability::Anonymous);
        assert!(capability.require(Level::Anonymous).is_ok());
        for level in [Level::Authenticated, Level::OrgMember, Level::OrgOwner] {
            assert!(matches!(capability.require(level), Err(Error::Unauthenticated)));
        }
    }

    #[test]
    fn non_member_fails_with_not_a_member_before_owner_check() {
        let capability = Capability::resolve(Some(principal()), None);
        assert_eq!(capability.level(), Level::Authenticated);
        assert!(capability.require(Level::Authenticated).is_ok());
        assert!(matches!(capability.require(Level::OrgOwner), Err(Error::NotAMember)));
    }

    #[test]
    fn member_is_not_owner() {
        let principal = principal();
        let capability =
            Capability::resolve(Some(principal.clone()), Some(membership(&principal, Role::Member)));
        assert_eq!(capability.level(), Level::OrgMember);
        assert!(capability.require(Level::OrgMember).is_ok());
        assert!(matches!(capability.require(Level::OrgOwner), Err(Error::NotOwner)));
    }

    #[test]
    fn owner_reaches_every_level() {
        let principal = principal();
        let capability =
            Capability::resolve(Some(principal.clone()), Some(membership(&principal, Role::Owner)));
        let Capability::OrgOwner(owner) = &capability else {
            panic!("expected owner capability, got {capability:?}");
        };
        assert_eq!(owner.user_id(), principal.user_id);
        assert_eq!(owner.member().role(), Role::Owner);
        assert!(capability.require(Level::OrgOwner).is_ok());
    }

    #[test]
    fn membership_of_another_user_is_rejected() {
        let principal = principal();
        let (org, mut member) = membership(&principal, Role::Owner);
        member.user_id = Uuid::new_v4();
        assert!(matches!(
            require_member(principal, Some(org), Some(member)),
            Err(Error::NotAMember)
        ));
    }
}
