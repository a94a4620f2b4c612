//! Organization endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{
    require_principal,
    types::{CreateOrgRequest, ErrorBody},
};
use crate::error::Result;
use crate::model::{OrgMembershipSummary, Organization};
use crate::slug::slugify;
use crate::AdminService;

#[utoipa::path(
    post,
    path = "/v1/orgs",
    request_body = CreateOrgRequest,
    responses(
        (status = 201, description = "Organization created; the caller is its owner.", body = Organization),
        (status = 400, description = "Invalid name or slug.", body = ErrorBody),
        (status = 401, description = "Missing or invalid session.", body = ErrorBody),
        (status = 409, description = "Organization slug already in use.", body = ErrorBody),
    ),
    tag = "orgs"
)]
/// Creates an organization owned by the caller.
/// When no slug is given one is suggested from the name; both paths go through validation.
pub async fn create_org(
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<CreateOrgRequest>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, &service).await?;
    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.name));
    let org = service
        .create_organization(&principal, &payload.name, &slug)
        .await?;
    Ok((StatusCode::CREATED, Json(org)))
}

#[utoipa::path(
    get,
    path = "/v1/orgs",
    responses(
        (status = 200, description = "Organizations the caller belongs to.", body = [OrgMembershipSummary]),
        (status = 401, description = "Missing or invalid session.", body = ErrorBody),
    ),
    tag = "orgs"
)]
pub async fn list_orgs(
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, &service).await?;
    Ok(Json(service.list_my_organizations(&principal).await?))
}
