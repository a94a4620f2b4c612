//! HTTP handlers for the administration API.
//!
//! Handlers only parse inputs, run the gate helpers below and call the
//! matching `AdminService` operation. Domain errors become JSON bodies of the
//! form `{"error": code, "message": text, "field": name}`.
//!
//! Flow Overview:
//! 1) Read the session token (bearer header or cookie).
//! 2) Resolve the principal, then the org membership, then the owner role,
//!    stopping at the level the endpoint requires.
//! 3) Run the operation with the resulting context.

pub mod api_keys;
pub mod health;
pub mod invites;
pub mod members;
pub mod orgs;
pub mod projects;
pub mod types;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::error;
use uuid::Uuid;

use super::session::extract_session_token;
use crate::error::{Error, Result};
use crate::gate::{MemberContext, OwnerContext, Principal};
use crate::AdminService;
use types::ErrorBody;

impl Error {
    /// Non-members get `404` like missing organizations, so org ids cannot be enumerated.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::NotOwner | Self::EmailMismatch => StatusCode::FORBIDDEN,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::NotAMember
            | Self::UserNotFound
            | Self::MemberNotFound
            | Self::InviteNotFound
            | Self::ProjectNotFound
            | Self::ApiKeyNotFound => StatusCode::NOT_FOUND,
            Self::SlugConflict(_)
            | Self::AlreadyMember
            | Self::CannotRemoveOwner
            | Self::MustTransferFirst
            | Self::InviteInactive
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InviteExpired => StatusCode::GONE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    /// Storage and internal failures are logged here and never leak details.
    fn into_response(self) -> Response {
        match &self {
            Self::Store(err) => error!("Storage failure: {err}"),
            Self::Internal(err) => error!("Internal failure: {err:#}"),
            _ => {}
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Gate level `Authenticated`.
pub(crate) async fn require_principal(
    headers: &HeaderMap,
    service: &AdminService,
) -> Result<Principal> {
    service
        .authenticate(extract_session_token(headers).as_deref())
        .await
}

/// Gate level `OrgMember`.
pub(crate) async fn require_member(
    headers: &HeaderMap,
    service: &AdminService,
    org_id: Uuid,
) -> Result<MemberContext> {
    let principal = require_principal(headers, service).await?;
    service.member_context(principal, org_id).await
}

/// Gate level `OrgOwner`.
pub(crate) async fn require_owner(
    headers: &HeaderMap,
    service: &AdminService,
    org_id: Uuid,
) -> Result<OwnerContext> {
    let principal = require_principal(headers, service).await?;
    service.owner_context(principal, org_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_map_to_distinct_statuses() {
        assert_eq!(Error::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::NotAMember.status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::NotOwner.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::InviteExpired.status(), StatusCode::GONE);
        assert_eq!(
            Error::SlugConflict("Organization").status(),
            StatusCode::CONFLICT
        );
    }
}
