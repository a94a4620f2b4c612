//! Membership endpoints. Listing needs membership; changes need ownership.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    require_member, require_owner,
    types::{AddMemberRequest, ErrorBody, UpdateMemberRoleRequest},
};
use crate::error::Result;
use crate::model::{MemberView, OrgMember};
use crate::AdminService;

#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/members",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Members, oldest first.", body = [MemberView]),
        (status = 401, description = "Missing or invalid session.", body = ErrorBody),
        (status = 404, description = "Organization not found.", body = ErrorBody),
    ),
    tag = "members"
)]
pub async fn list_members(
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_member(&headers, &service, org_id).await?;
    Ok(Json(service.list_members(&ctx).await?))
}

#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/members",
    request_body = AddMemberRequest,
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 201, description = "Member added.", body = OrgMember),
        (status = 403, description = "Caller is not the owner.", body = ErrorBody),
        (status = 404, description = "Organization or user not found.", body = ErrorBody),
        (status = 409, description = "User is already a member.", body = ErrorBody),
    ),
    tag = "members"
)]
pub async fn add_member(
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse> {
    let ctx = require_owner(&headers, &service, org_id).await?;
    let member = service.add_member(&ctx, &payload.email).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    patch,
    path = "/v1/orgs/{org_id}/members/{user_id}",
    request_body = UpdateMemberRoleRequest,
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("user_id" = Uuid, Path, description = "Member user id"),
    ),
    responses(
        (status = 200, description = "Role updated; granting OWNER transfers ownership.", body = OrgMember),
        (status = 403, description = "Caller is not the owner.", body = ErrorBody),
        (status = 404, description = "Organization or member not found.", body = ErrorBody),
        (status = 409, description = "Ownership must be transferred first.", body = ErrorBody),
    ),
    tag = "members"
)]
pub async fn update_member_role(
    Path((org_id, user_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> Result<impl IntoResponse> {
    let ctx = require_owner(&headers, &service, org_id).await?;
    Ok(Json(
        service
            .update_member_role(&ctx, user_id, payload.role)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/v1/orgs/{org_id}/members/{user_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("user_id" = Uuid, Path, description = "Member user id"),
    ),
    responses(
        (status = 204, description = "Member removed."),
        (status = 403, description = "Caller is not the owner.", body = ErrorBody),
        (status = 404, description = "Organization or member not found.", body = ErrorBody),
        (status = 409, description = "The owner cannot be removed.", body = ErrorBody),
    ),
    tag = "members"
)]
pub async fn remove_member(
    Path((org_id, user_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_owner(&headers, &service, org_id).await?;
    service.remove_member(&ctx, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
