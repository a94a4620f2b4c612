use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    require_member,
    types::{CreateProjectRequest, ErrorBody},
};
use crate::error::Result;
use crate::model::Project;
use crate::slug::slugify;
use crate::AdminService;

#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/projects",
    request_body = CreateProjectRequest,
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 201, description = "Project created.", body = Project),
        (status = 400, description = "Invalid name or slug.", body = ErrorBody),
        (status = 404, description = "Organization not found.", body = ErrorBody),
        (status = 409, description = "Project slug already in use.", body = ErrorBody),
    ),
    tag = "projects"
)]
pub async fn create_project(
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse> {
    let ctx = require_member(&headers, &service, org_id).await?;
    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.name));
    let project = service.create_project(&ctx, &payload.name, &slug).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/projects",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Projects, oldest first.", body = [Project]),
        (status = 404, description = "Organization not found.", body = ErrorBody),
    ),
    tag = "projects"
)]
pub async fn list_projects(
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_member(&headers, &service, org_id).await?;
    Ok(Json(service.list_projects(&ctx).await?))
}
