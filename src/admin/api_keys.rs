//! Project-scoped API keys.
//!
//! A key is returned in full exactly once. Storage keeps the SHA-256 hash,
//! which is also how `authenticate_api_key` resolves a presented key, and
//! the last four characters for display. Revocation is monotonic.

use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{validate_name, AdminService};
use crate::error::{Error, Result};
use crate::gate::MemberContext;
use crate::model::{ApiKey, ApiKeyScope, ApiKeySummary};
use crate::secrets::{generate_key, hash_secret, API_KEY_PREFIX};

/// A new key and its one-time secret.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CreatedApiKey {
    pub api_key: ApiKeySummary,
    pub secret: String,
}

impl AdminService {
    /// # Errors
    /// `ProjectNotFound` when the project is not in the caller's organization,
    /// `InvalidInput` for the name.
    #[instrument(skip(self, ctx, name), fields(org_id = %ctx.org_id()))]
    pub async fn create_api_key(
        &self,
        ctx: &MemberContext,
        project_id: Uuid,
        name: &str,
    ) -> Result<CreatedApiKey> {
        let project = self
            .store
            .find_project(ctx.org_id(), project_id)
            .await?
            .ok_or(Error::ProjectNotFound)?;
        let name = validate_name(name)?;

        let generated = generate_key()?;
        let key = ApiKey {
            id: Uuid::new_v4(),
            project_id: project.id,
            created_by_user_id: ctx.user_id(),
            name,
            key_hash: generated.hash,
            key_last4: generated.last4,
            revoked_at: None,
            created_at: self.now(),
        };
        self.store.insert_api_key(&key).await?;

        info!(api_key_id = %key.id, "api key created");
        Ok(CreatedApiKey {
            api_key: key.summary(),
            secret: generated.secret,
        })
    }

    /// Keys of a project, newest first, without hashes.
    ///
    /// # Errors
    /// `ProjectNotFound` when the project is not in the caller's organization.
    pub async fn list_api_keys(
        &self,
        ctx: &MemberContext,
        project_id: Uuid,
    ) -> Result<Vec<ApiKeySummary>> {
        let project = self
            .store
            .find_project(ctx.org_id(), project_id)
            .await?
            .ok_or(Error::ProjectNotFound)?;
        let keys = self.store.list_api_keys(project.id).await?;
        Ok(keys.iter().map(ApiKey::summary).collect())
    }

    /// Idempotent: revoking twice returns the first `revoked_at`.
    ///
    /// # Errors
    /// `ApiKeyNotFound` unless the key belongs to a project of the organization.
    #[instrument(skip(self, ctx), fields(org_id = %ctx.org_id()))]
    pub async fn revoke_api_key(
        &self,
        ctx: &MemberContext,
        api_key_id: Uuid,
    ) -> Result<ApiKeySummary> {
        let key = self
            .store
            .find_api_key(ctx.org_id(), api_key_id)
            .await?
            .ok_or(Error::ApiKeyNotFound)?;
        if key.revoked_at.is_some() {
            return Ok(key.summary());
        }
        let revoked = self
            .store
            .revoke_api_key(key.id, self.now())
            .await?
            .ok_or(Error::ApiKeyNotFound)?;
        info!(api_key_id = %revoked.id, "api key revoked");
        Ok(revoked.summary())
    }

    /// Resolves a presented secret to the project it grants access to.
    ///
    /// # Errors
    /// `InvalidApiKey` for malformed, unknown and revoked keys alike.
    pub async fn authenticate_api_key(&self, secret: &str) -> Result<ApiKeyScope> {
        let secret = secret.trim();
        if !secret.starts_with(API_KEY_PREFIX) {
            return Err(Error::InvalidApiKey);
        }
        self.store
            .find_active_api_key(&hash_secret(secret))
            .await?
            .ok_or(Error::InvalidApiKey)
    }
}
