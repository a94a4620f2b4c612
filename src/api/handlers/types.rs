//! Request/response types for the administration API.
//!
//! These payloads are shared between handlers and `OpenAPI` generation.
//! Responses mostly reuse the domain summaries from `crate::model` and the
//! engine results, none of which carry secret hashes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::Role;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `slug_conflict`.
    pub error: String,
    pub message: String,
    /// Form field the message belongs to, if any.
    pub field: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrgRequest {
    pub name: String,
    /// Suggested from the name when omitted; validated either way.
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInviteRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IntrospectRequest {
    /// Falls back to the `Authorization: Bearer` header when omitted.
    pub key: Option<String>,
}
