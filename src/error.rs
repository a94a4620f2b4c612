//! Domain error taxonomy returned by every administration operation.
//!
//! Each variant carries a human-readable message suitable for inline display;
//! `field` names the form input it belongs to, if any.

use thiserror::Error;

use crate::store::{Constraint, StoreError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Sign in to continue.")]
    Unauthenticated,
    #[error("Organization not found.")]
    NotAMember,
    #[error("Only the organization owner can do this.")]
    NotOwner,
    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: &'static str,
    },
    #[error("{0} slug already in use.")]
    SlugConflict(&'static str),
    #[error("User not found.")]
    UserNotFound,
    #[error("User is already a member of this organization.")]
    AlreadyMember,
    #[error("You cannot remove the organization owner.")]
    CannotRemoveOwner,
    #[error("Member not found.")]
    MemberNotFound,
    #[error("Transfer ownership before demoting the current owner.")]
    MustTransferFirst,
    #[error("Invite not found.")]
    InviteNotFound,
    #[error("This invite has already been used or was revoked.")]
    InviteInactive,
    #[error("This invite has expired. Ask your organization owner to resend it.")]
    InviteExpired,
    #[error("This invite was sent to a different email address.")]
    EmailMismatch,
    #[error("Project not found.")]
    ProjectNotFound,
    #[error("API key not found.")]
    ApiKeyNotFound,
    #[error("Invalid API key.")]
    InvalidApiKey,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("storage failure")]
    Store(#[source] StoreError),
    #[error("internal failure")]
    Internal(#[source] anyhow::Error),
}

impl Error {
    /// Form field the message should be rendered next to.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput { field, .. } => Some(*field),
            Self::SlugConflict(_) => Some("slug"),
            Self::UserNotFound | Self::AlreadyMember => Some("email"),
            _ => None,
        }
    }

    /// Stable machine-readable code for API clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotAMember => "not_a_member",
            Self::NotOwner => "not_owner",
            Self::InvalidInput { .. } => "invalid_input",
            Self::SlugConflict(_) => "slug_conflict",
            Self::UserNotFound => "user_not_found",
            Self::AlreadyMember => "already_member",
            Self::CannotRemoveOwner => "cannot_remove_owner",
            Self::MemberNotFound => "member_not_found",
            Self::MustTransferFirst => "must_transfer_first",
            Self::InviteNotFound => "invite_not_found",
            Self::InviteInactive => "invite_inactive",
            Self::InviteExpired => "invite_expired",
            Self::EmailMismatch => "email_mismatch",
            Self::ProjectNotFound => "project_not_found",
            Self::ApiKeyNotFound => "api_key_not_found",
            Self::InvalidApiKey => "invalid_api_key",
            Self::Conflict(_) => "conflict",
            Self::Store(_) | Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn invalid(field: &'static str, message: &'static str) -> Self {
        Self::InvalidInput { field, message }
    }
}

impl From<StoreError> for Error {
    /// Constraint violations become the matching conflict; anything else stays opaque.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(Constraint::OrgSlug) => Self::SlugConflict("Organization"),
            StoreError::Conflict(Constraint::ProjectSlug) => Self::SlugConflict("Project"),
            StoreError::Conflict(Constraint::Membership) => Self::AlreadyMember,
            StoreError::Conflict(Constraint::InviteToken) => {
                Self::Conflict("Invite token collision, try again.")
            }
            StoreError::Conflict(Constraint::ApiKeyHash) => {
                Self::Conflict("API key collision, try again.")
            }
            StoreError::Conflict(Constraint::SingleOwner) => {
                Self::Conflict("Ownership changed concurrently, try again.")
            }
            other => Self::Store(other),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
