//! Postgres-backed `Store` built on `sqlx`.
//!
//! Multi-statement steps run inside a transaction; if the caller goes away
//! mid-request the transaction is dropped and rolled back, never half-applied.
//! Unique violations (SQLSTATE `23505`) are translated to
//! `StoreError::Conflict` by constraint name; see `sql/schema.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use super::{AcceptOutcome, Constraint, Store, StoreError};
use crate::model::{
    ApiKey, ApiKeyScope, InviteLookup, MemberUser, MemberView, OrgInvite, OrgMember,
    OrgMembershipSummary, Organization, Project, Role, User,
};

/// Idempotent DDL for every table the store touches.
pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const ORG_COLUMNS: &str = "id, name, slug, owner_user_id, created_at";
const MEMBER_COLUMNS: &str = "id, org_id, user_id, role, created_at";
const INVITE_COLUMNS: &str = "id, org_id, email, role, token_hash, expires_at, accepted_at, revoked_at, invited_by_user_id, created_at";
const PROJECT_COLUMNS: &str = "id, org_id, name, slug, created_at";
const API_KEY_COLUMNS: &str =
    "id, project_id, created_by_user_id, name, key_hash, key_last4, revoked_at, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies `sql/schema.sql`; safe to run on every start.
    ///
    /// # Errors
    /// Any database error raised by the DDL.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

/// Row lock that serializes ownership transfers and invite supersession per organization.
const LOCK_ORG_SQL: &str = "SELECT id FROM organizations WHERE id = $1 FOR UPDATE";

const UNIQUE_CONSTRAINTS: [(&str, Constraint); 6] = [
    ("organizations_slug_key", Constraint::OrgSlug),
    ("projects_org_slug_key", Constraint::ProjectSlug),
    ("org_members_org_user_key", Constraint::Membership),
    ("org_invites_token_hash_key", Constraint::InviteToken),
    ("api_keys_key_hash_key", Constraint::ApiKeyHash),
    ("org_members_single_owner_idx", Constraint::SingleOwner),
];

fn constraint_by_name(name: &str) -> Option<Constraint> {
    UNIQUE_CONSTRAINTS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, constraint)| *constraint)
}

/// Translate unique violations into the matching `Constraint`; everything else is opaque.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(constraint) = db_err.constraint().and_then(constraint_by_name) {
                return StoreError::Conflict(constraint);
            }
        }
    }
    StoreError::Database(err)
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    let raw: String = row.try_get("role")?;
    Role::from_db(&raw).ok_or_else(|| StoreError::Corrupt(format!("unknown role {raw}")))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
    })
}

fn org_from_row(row: &PgRow) -> Result<Organization, StoreError> {
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        owner_user_id: row.try_get("owner_user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn member_from_row(row: &PgRow) -> Result<OrgMember, StoreError> {
    Ok(OrgMember {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        user_id: row.try_get("user_id")?,
        role: role_from_row(row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn invite_from_row(row: &PgRow) -> Result<OrgInvite, StoreError> {
    Ok(OrgInvite {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        email: row.try_get("email")?,
        role: role_from_row(row)?,
        token_hash: row.try_get("token_hash")?,
        expires_at: row.try_get("expires_at")?,
        accepted_at: row.try_get("accepted_at")?,
        revoked_at: row.try_get("revoked_at")?,
        invited_by_user_id: row.try_get("invited_by_user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, StoreError> {
    Ok(Project {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
    })
}

fn api_key_from_row(row: &PgRow) -> Result<ApiKey, StoreError> {
    Ok(ApiKey {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        created_by_user_id: row.try_get("created_by_user_id")?,
        name: row.try_get("name")?,
        key_hash: row.try_get("key_hash")?,
        key_last4: row.try_get("key_last4")?,
        revoked_at: row.try_get("revoked_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT u.id, u.email, u.name
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_hash = $1 AND s.expires_at > $2
            LIMIT 1
            ",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, email, name FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip_all, fields(org_id = %org.id))]
    async fn insert_organization(
        &self,
        org: &Organization,
        owner: &OrgMember,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"
            INSERT INTO organizations (id, name, slug, owner_user_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(&org.slug)
        .bind(org.owner_user_id)
        .bind(org.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        sqlx::query(
            r"
            INSERT INTO org_members (id, org_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(owner.id)
        .bind(owner.org_id)
        .bind(owner.user_id)
        .bind(owner.role.as_str())
        .bind(owner.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(())
    }

    async fn organization_slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM organizations WHERE slug = $1) AS taken")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("taken")?)
    }

    async fn find_organization(&self, org_id: Uuid) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(org_from_row).transpose()
    }

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrgMembershipSummary>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT o.id AS org_id, o.name AS org_name, o.slug AS org_slug, m.role
            FROM org_members m
            JOIN organizations o ON o.id = m.org_id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(OrgMembershipSummary {
                    org_id: row.try_get("org_id")?,
                    org_name: row.try_get("org_name")?,
                    org_slug: row.try_get("org_slug")?,
                    role: role_from_row(row)?,
                })
            })
            .collect()
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgMember>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM org_members WHERE org_id = $1 AND user_id = $2"
        ))
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(member_from_row).transpose()
    }

    async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberView>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT m.id, m.role, m.created_at, u.id AS user_id, u.name, u.email
            FROM org_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            ",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(MemberView {
                    id: row.try_get("id")?,
                    role: role_from_row(row)?,
                    created_at: row.try_get("created_at")?,
                    user: MemberUser {
                        id: row.try_get("user_id")?,
                        name: row.try_get("name")?,
                        email: row.try_get("email")?,
                    },
                })
            })
            .collect()
    }

    async fn insert_member(&self, member: &OrgMember) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO org_members (id, org_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(member.id)
        .bind(member.org_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn delete_member(&self, org_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM org_members WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn transfer_ownership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgMember>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_ORG_SQL)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        // Demote first: the single-owner partial index is checked per statement.
        sqlx::query("UPDATE org_members SET role = 'MEMBER' WHERE org_id = $1 AND role = 'OWNER'")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        let promoted = sqlx::query(&format!(
            "UPDATE org_members SET role = 'OWNER' WHERE org_id = $1 AND user_id = $2 RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?;
        let Some(promoted) = promoted else {
            tx.rollback().await?;
            return Ok(None);
        };
        sqlx::query("UPDATE organizations SET owner_user_id = $2 WHERE id = $1")
            .bind(org_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let member = member_from_row(&promoted)?;
        tx.commit().await?;
        Ok(Some(member))
    }

    #[instrument(skip_all, fields(org_id = %invite.org_id))]
    async fn supersede_invites(
        &self,
        invite: &OrgInvite,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(LOCK_ORG_SQL)
            .bind(invite.org_id)
            .execute(&mut *tx)
            .await?;
        let revoked = sqlx::query(
            r"
            UPDATE org_invites
            SET revoked_at = $3
            WHERE org_id = $1 AND email = $2
              AND accepted_at IS NULL AND revoked_at IS NULL AND expires_at > $3
            ",
        )
        .bind(invite.org_id)
        .bind(&invite.email)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        sqlx::query(
            r"
            INSERT INTO org_invites
                (id, org_id, email, role, token_hash, expires_at, invited_by_user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(invite.id)
        .bind(invite.org_id)
        .bind(&invite.email)
        .bind(invite.role.as_str())
        .bind(&invite.token_hash)
        .bind(invite.expires_at)
        .bind(invite.invited_by_user_id)
        .bind(invite.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(revoked)
    }

    async fn list_pending_invites(
        &self,
        org_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrgInvite>, StoreError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {INVITE_COLUMNS}
            FROM org_invites
            WHERE org_id = $1 AND accepted_at IS NULL AND revoked_at IS NULL AND expires_at > $2
            ORDER BY created_at DESC
            "
        ))
        .bind(org_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(invite_from_row).collect()
    }

    async fn revoke_invite(
        &self,
        org_id: Uuid,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<OrgInvite>, StoreError> {
        let row = sqlx::query(&format!(
            r"
            UPDATE org_invites
            SET revoked_at = $3
            WHERE id = $1 AND org_id = $2 AND revoked_at IS NULL AND accepted_at IS NULL
            RETURNING {INVITE_COLUMNS}
            "
        ))
        .bind(invite_id)
        .bind(org_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(invite_from_row).transpose()
    }

    async fn find_invite_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<InviteLookup>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT i.id, i.org_id, i.email, i.role, i.token_hash, i.expires_at, i.accepted_at,
                   i.revoked_at, i.invited_by_user_id, i.created_at,
                   o.name AS org_name, u.name AS inviter_name
            FROM org_invites i
            JOIN organizations o ON o.id = i.org_id
            LEFT JOIN users u ON u.id = i.invited_by_user_id
            WHERE i.token_hash = $1
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(InviteLookup {
            invite: invite_from_row(&row)?,
            org_name: row.try_get("org_name")?,
            inviter_name: row.try_get("inviter_name")?,
        }))
    }

    #[instrument(skip_all, fields(invite_id = %invite.id))]
    async fn accept_invite(
        &self,
        invite: &OrgInvite,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let stamped = sqlx::query(
            r"
            UPDATE org_invites
            SET accepted_at = $2
            WHERE id = $1 AND accepted_at IS NULL AND revoked_at IS NULL
            ",
        )
        .bind(invite.id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if stamped == 0 {
            tx.rollback().await?;
            return Ok(AcceptOutcome::Inactive);
        }
        let created = sqlx::query(
            r"
            INSERT INTO org_members (id, org_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (org_id, user_id) DO NOTHING
            ",
        )
        .bind(Uuid::new_v4())
        .bind(invite.org_id)
        .bind(user_id)
        .bind(invite.role.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;
        Ok(AcceptOutcome::Accepted {
            membership_created: created > 0,
        })
    }

    async fn project_slug_taken(&self, org_id: Uuid, slug: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE org_id = $1 AND slug = $2) AS taken",
        )
        .bind(org_id)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("taken")?)
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO projects (id, org_id, name, slug, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(project.id)
        .bind(project.org_id)
        .bind(&project.name)
        .bind(&project.slug)
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn list_projects(&self, org_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE org_id = $1 ORDER BY created_at ASC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(project_from_row).collect()
    }

    async fn find_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND org_id = $2"
        ))
        .bind(project_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO api_keys
                (id, project_id, created_by_user_id, name, key_hash, key_last4, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(key.id)
        .bind(key.project_id)
        .bind(key.created_by_user_id)
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(&key.key_last4)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn list_api_keys(&self, project_id: Uuid) -> Result<Vec<ApiKey>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE project_id = $1 ORDER BY created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(api_key_from_row).collect()
    }

    async fn find_api_key(
        &self,
        org_id: Uuid,
        api_key_id: Uuid,
    ) -> Result<Option<ApiKey>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT k.id, k.project_id, k.created_by_user_id, k.name, k.key_hash, k.key_last4,
                   k.revoked_at, k.created_at
            FROM api_keys k
            JOIN projects p ON p.id = k.project_id
            WHERE k.id = $1 AND p.org_id = $2
            ",
        )
        .bind(api_key_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn revoke_api_key(
        &self,
        api_key_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKey>, StoreError> {
        // COALESCE keeps the first timestamp when two revocations race.
        let row = sqlx::query(&format!(
            "UPDATE api_keys SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1 RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(api_key_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyScope>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT k.id AS api_key_id, k.project_id, p.org_id
            FROM api_keys k
            JOIN projects p ON p.id = k.project_id
            WHERE k.key_hash = $1 AND k.revoked_at IS NULL
            ",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ApiKeyScope {
            api_key_id: row.try_get("api_key_id")?,
            project_id: row.try_get("project_id")?,
            org_id: row.try_get("org_id")?,
        }))
    }
}
