//! `OpenAPI` document for the administration API.
//!
//! Every routed handler in `api::router` must also be listed in `paths` so the
//! served routes and the published document stay in sync; the router test
//! checks this.

use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use super::handlers::{api_keys, health, invites, members, orgs, projects, types};
use crate::admin::{AcceptedInvite, CreatedApiKey, CreatedInvite, InvitePreview};
use crate::model::{
    ApiKeyScope, ApiKeySummary, InviteState, InviteSummary, MemberUser, MemberView, OrgMember,
    OrgMembershipSummary, Organization, Project, Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        orgs::create_org,
        orgs::list_orgs,
        members::list_members,
        members::add_member,
        members::update_member_role,
        members::remove_member,
        invites::create_invite,
        invites::list_invites,
        invites::revoke_invite,
        invites::preview_invite,
        invites::accept_invite,
        projects::create_project,
        projects::list_projects,
        api_keys::create_api_key,
        api_keys::list_api_keys,
        api_keys::revoke_api_key,
        api_keys::introspect,
    ),
    components(schemas(
        health::Health,
        types::ErrorBody,
        types::CreateOrgRequest,
        types::AddMemberRequest,
        types::UpdateMemberRoleRequest,
        types::CreateInviteRequest,
        types::AcceptInviteRequest,
        types::CreateProjectRequest,
        types::CreateApiKeyRequest,
        types::IntrospectRequest,
        Role,
        Organization,
        OrgMember,
        OrgMembershipSummary,
        MemberUser,
        MemberView,
        InviteState,
        InviteSummary,
        CreatedInvite,
        InvitePreview,
        AcceptedInvite,
        Project,
        ApiKeySummary,
        CreatedApiKey,
        ApiKeyScope,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "orgs", description = "Organizations"),
        (name = "members", description = "Memberships and ownership"),
        (name = "invites", description = "Email invitations"),
        (name = "projects", description = "Projects"),
        (name = "api-keys", description = "Project API keys"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}
