//! Invite endpoints.
//!
//! Owners manage invites under the organization; the token-based preview is
//! public and accepting only needs a session whose email matches the invite.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    require_owner, require_principal,
    types::{AcceptInviteRequest, CreateInviteRequest, ErrorBody},
};
use crate::admin::{AcceptedInvite, CreatedInvite, InvitePreview};
use crate::error::Result;
use crate::model::InviteSummary;
use crate::AdminService;

#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/invites",
    request_body = CreateInviteRequest,
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 201, description = "Invite created and emailed; the token is only returned here.", body = CreatedInvite),
        (status = 400, description = "Invalid email.", body = ErrorBody),
        (status = 403, description = "Caller is not the owner.", body = ErrorBody),
        (status = 404, description = "Organization not found.", body = ErrorBody),
        (status = 409, description = "Email already belongs to a member.", body = ErrorBody),
    ),
    tag = "invites"
)]
pub async fn create_invite(
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<CreateInviteRequest>,
) -> Result<impl IntoResponse> {
    let ctx = require_owner(&headers, &service, org_id).await?;
    let created = service.create_invite(&ctx, &payload.email).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/invites",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Pending invites, newest first.", body = [InviteSummary]),
        (status = 403, description = "Caller is not the owner.", body = ErrorBody),
        (status = 404, description = "Organization not found.", body = ErrorBody),
    ),
    tag = "invites"
)]
pub async fn list_invites(
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_owner(&headers, &service, org_id).await?;
    Ok(Json(service.list_invites(&ctx).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/orgs/{org_id}/invites/{invite_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("invite_id" = Uuid, Path, description = "Invite id"),
    ),
    responses(
        (status = 200, description = "Invite revoked.", body = InviteSummary),
        (status = 403, description = "Caller is not the owner.", body = ErrorBody),
        (status = 404, description = "Organization or invite not found.", body = ErrorBody),
    ),
    tag = "invites"
)]
pub async fn revoke_invite(
    Path((org_id, invite_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_owner(&headers, &service, org_id).await?;
    Ok(Json(service.revoke_invite(&ctx, invite_id).await?))
}

#[utoipa::path(
    get,
    path = "/v1/invites/{token}",
    params(("token" = String, Path, description = "Raw invite token from the emailed link")),
    responses(
        (status = 200, description = "Invite landing page data.", body = InvitePreview),
        (status = 404, description = "Invite not found.", body = ErrorBody),
    ),
    tag = "invites"
)]
pub async fn preview_invite(
    Path(token): Path<String>,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    Ok(Json(service.preview_invite(&token).await?))
}

#[utoipa::path(
    post,
    path = "/v1/invites/accept",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Invite accepted.", body = AcceptedInvite),
        (status = 401, description = "Missing or invalid session.", body = ErrorBody),
        (status = 403, description = "Invite was sent to a different email.", body = ErrorBody),
        (status = 404, description = "Invite not found.", body = ErrorBody),
        (status = 409, description = "Invite already used or revoked.", body = ErrorBody),
        (status = 410, description = "Invite expired.", body = ErrorBody),
    ),
    tag = "invites"
)]
pub async fn accept_invite(
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<AcceptInviteRequest>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, &service).await?;
    Ok(Json(service.accept_invite(&principal, &payload.token).await?))
}
