use tracing::{info, instrument};
use uuid::Uuid;

use super::{validate_name, AdminService};
use crate::error::{Error, Result};
use crate::gate::MemberContext;
use crate::model::Project;
use crate::slug::validate_slug;

impl AdminService {
    /// Creates a project; any member may do this.
    ///
    /// # Errors
    /// `InvalidInput` for the name or slug, `SlugConflict` when the slug is
    /// already used inside the organization.
    #[instrument(skip(self, ctx, name), fields(org_id = %ctx.org_id()))]
    pub async fn create_project(
        &self,
        ctx: &MemberContext,
        name: &str,
        slug: &str,
    ) -> Result<Project> {
        let name = validate_name(name)?;
        let slug = validate_slug(slug).map_err(|err| Error::invalid("slug", err.message()))?;

        if self
            .store
            .project_slug_taken(ctx.org_id(), slug.as_str())
            .await?
        {
            return Err(Error::SlugConflict("Project"));
        }

        let project = Project {
            id: Uuid::new_v4(),
            org_id: ctx.org_id(),
            name,
            slug: slug.into_string(),
            created_at: self.now(),
        };
        self.store.insert_project(&project).await?;

        info!(project_id = %project.id, slug = %project.slug, "project created");
        Ok(project)
    }

    /// Projects of the organization, oldest first.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn list_projects(&self, ctx: &MemberContext) -> Result<Vec<Project>> {
        Ok(self.store.list_projects(ctx.org_id()).await?)
    }
}
