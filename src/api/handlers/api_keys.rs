//! API key endpoints.
//!
//! Any org member may issue and revoke keys. The secret is only present in the
//! create response. `introspect` is the consumer side: services holding a key
//! resolve it to the project and organization it belongs to.

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
    types::{CreateApiKeyRequest, ErrorBody, IntrospectRequest},
};
use crate::admin::CreatedApiKey;
use crate::api::session::extract_bearer_token;
use crate::error::{Error, Result};
use crate::model::{ApiKeyScope, ApiKeySummary};
use crate::AdminService;

#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/projects/{project_id}/api-keys",
    request_body = CreateApiKeyRequest,
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("project_id" = Uuid, Path, description = "Project id"),
    ),
    responses(
        (status = 201, description = "Key created; the secret is shown once.", body = CreatedApiKey),
        (status = 400, description = "Invalid name.", body = ErrorBody),
        (status = 404, description = "Organization or project not found.", body = ErrorBody),
    ),
    tag = "api-keys"
)]
pub async fn create_api_key(
    Path((org_id, project_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    Json(payload): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse> {
    let ctx = require_member(&headers, &service, org_id).await?;
    let created = service
        .create_api_key(&ctx, project_id, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/projects/{project_id}/api-keys",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("project_id" = Uuid, Path, description = "Project id"),
    ),
    responses(
        (status = 200, description = "Keys, newest first, without secrets.", body = [ApiKeySummary]),
        (status = 404, description = "Organization or project not found.", body = ErrorBody),
    ),
    tag = "api-keys"
)]
pub async fn list_api_keys(
    Path((org_id, project_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_member(&headers, &service, org_id).await?;
    Ok(Json(service.list_api_keys(&ctx, project_id).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/orgs/{org_id}/api-keys/{api_key_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("api_key_id" = Uuid, Path, description = "API key id"),
    ),
    responses(
        (status = 200, description = "Key revoked; repeating returns the original timestamp.", body = ApiKeySummary),
        (status = 404, description = "Organization or key not found.", body = ErrorBody),
    ),
    tag = "api-keys"
)]
pub async fn revoke_api_key(
    Path((org_id, api_key_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
) -> Result<impl IntoResponse> {
    let ctx = require_member(&headers, &service, org_id).await?;
    Ok(Json(service.revoke_api_key(&ctx, api_key_id).await?))
}

#[utoipa::path(
    post,
    path = "/v1/api-keys/introspect",
    request_body = IntrospectRequest,
    responses(
        (status = 200, description = "Key is active.", body = ApiKeyScope),
        (status = 401, description = "Unknown or revoked key.", body = ErrorBody),
    ),
    tag = "api-keys"
)]
pub async fn introspect(
    headers: HeaderMap,
    service: Extension<Arc<AdminService>>,
    payload: Option<Json<IntrospectRequest>>,
) -> Result<impl IntoResponse> {
    let key = payload
        .and_then(|Json(body)| body.key)
        .or_else(|| extract_bearer_token(&headers))
        .ok_or(Error::InvalidApiKey)?;
    Ok(Json(service.authenticate_api_key(&key).await?))
}
