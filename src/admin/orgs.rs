//! Organization creation and the caller's organization list.

use tracing::{info, instrument};
use uuid::Uuid;

use super::{validate_name, AdminService};
use crate::error::{Error, Result};
use crate::gate::Principal;
use crate::model::{OrgMember, OrgMembershipSummary, Organization, Role};
use crate::slug::validate_slug;

impl AdminService {
    /// Creates an organization with the caller as its only owner.
    ///
    /// The slug is validated as given, never normalized. The pre-check only
    /// produces a friendlier error; the unique constraint decides races.
    ///
    /// # Errors
    /// `InvalidInput` for the name or slug, `SlugConflict` when taken.
    #[instrument(skip(self, principal, name), fields(user_id = %principal.user_id))]
    pub async fn create_organization(
        &self,
        principal: &Principal,
        name: &str,
        slug: &str,
    ) -> Result<Organization> {
        let name = validate_name(name)?;
        let slug = validate_slug(slug).map_err(|err| Error::invalid("slug", err.message()))?;

        if self.store.organization_slug_taken(slug.as_str()).await? {
            return Err(Error::SlugConflict("Organization"));
        }

        let now = self.now();
        let org = Organization {
            id: Uuid::new_v4(),
            name,
            slug: slug.into_string(),
            owner_user_id: principal.user_id,
            created_at: now,
        };
        let owner = OrgMember {
            id: Uuid::new_v4(),
            org_id: org.id,
            user_id: principal.user_id,
            role: Role::Owner,
            created_at: now,
        };
        self.store.insert_organization(&org, &owner).await?;

        info!(org_id = %org.id, slug = %org.slug, "organization created");
        Ok(org)
    }

    /// Every organization the caller belongs to, with the caller's role.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn list_my_organizations(
        &self,
        principal: &Principal,
    ) -> Result<Vec<OrgMembershipSummary>> {
        Ok(self
            .store
            .list_memberships_for_user(principal.user_id)
            .await?)
    }
}
