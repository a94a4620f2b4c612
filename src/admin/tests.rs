//! Scenario tests for the administration engines over `MemoryStore`.
//!
//! A manual clock drives invite expiry and keeps `created_at` ordering
//! deterministic; a recording sender captures invite emails.

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use super::*;
use crate::email::{EmailSender, InviteEmail};
use crate::model::{InviteState, Role};
use crate::secrets::{build_invite_url, API_KEY_PREFIX};
use crate::store::MemoryStore;

#[derive(Debug)]
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Mutex::new(start),
        }
    }

    fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

#[derive(Debug, Default)]
struct RecordingSender {
    sent: Mutex<Vec<InviteEmail>>,
    fail: bool,
}

impl EmailSender for RecordingSender {
    fn send_invite(&self, message: &InviteEmail) -> anyhow::Result<()> {
        self.sent.lock().expect("sender lock").push(message.clone());
        if self.fail {
            Err(anyhow!("smtp unavailable"))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    emails: Arc<RecordingSender>,
    service: AdminService,
}

impl Harness {
    fn new() -> Self {
        Self::with_sender(RecordingSender::default())
    }

    fn with_sender(sender: RecordingSender) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let emails = Arc::new(sender);
        let service = AdminService::new(store.clone(), emails.clone(), AdminConfig::new())
            .with_clock(clock.clone());
        Self {
            store,
            clock,
            emails,
            service,
        }
    }

    async fn user(&self, email: &str, name: &str) -> Principal {
        Principal::from(self.store.insert_user(email, Some(name)).await)
    }

    /// Each creation step moves the clock so ordering never ties.
    fn tick(&self) {
        self.clock.advance(TimeDelta::seconds(1));
    }

    async fn owner(&self, principal: &Principal, org_id: Uuid) -> Result<OwnerContext> {
        Ok(self.service.owner_context(principal.clone(), org_id).await?)
    }

    async fn member(&self, principal: &Principal, org_id: Uuid) -> Result<MemberContext> {
        Ok(self.service.member_context(principal.clone(), org_id).await?)
    }

    /// u1 owns "Acme", u2 exists but is not a member yet.
    async fn acme(&self) -> Result<(Principal, Principal, Uuid)> {
        let u1 = self.user("u1@x.com", "U1").await;
        let u2 = self.user("u2@x.com", "U2").await;
        let org = self.service.create_organization(&u1, "Acme", "acme").await?;
        self.tick();
        Ok((u1, u2, org.id))
    }

    /// acme plus u2 joined through an invite.
    async fn acme_with_member(&self) -> Result<(Principal, Principal, Uuid)> {
        let (u1, u2, org_id) = self.acme().await?;
        let owner = self.owner(&u1, org_id).await?;
        let created = self.service.create_invite(&owner, "u2@x.com").await?;
        self.tick();
        self.service.accept_invite(&u2, &created.token).await?;
        self.tick();
        Ok((u1, u2, org_id))
    }
}

#[tokio::test]
async fn acme_invite_is_emailed_and_accepted_once() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;

    let created = h.service.create_invite(&owner, " U2@X.com ").await?;
    assert_eq!(created.invite.email, "u2@x.com");
    assert_eq!(created.invite.role, Role::Member);
    assert_eq!(
        created.invite_url,
        build_invite_url("http://localhost:3000", &created.token)
    );
    assert_eq!(
        created.invite.expires_at - created.invite.created_at,
        TimeDelta::days(7)
    );

    let sent = h.emails.sent.lock().expect("sender lock").clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "u2@x.com");
    assert_eq!(sent[0].org_name, "Acme");
    assert_eq!(sent[0].invite_url, created.invite_url);
    assert_eq!(sent[0].inviter_name.as_deref(), Some("U1"));

    let preview = h.service.preview_invite(&created.token).await?;
    assert_eq!(preview.org_name, "Acme");
    assert_eq!(preview.state, InviteState::Pending);

    h.tick();
    let accepted = h.service.accept_invite(&u2, &created.token).await?;
    assert_eq!(accepted.org_id, org_id);
    assert_eq!(accepted.role, Role::Member);
    assert!(accepted.membership_created);

    let members = h.service.list_members(&h.member(&u2, org_id).await?).await?;
    let roles: Vec<_> = members.iter().map(|m| (m.user.email.as_str(), m.role)).collect();
    assert_eq!(roles, vec![("u1@x.com", Role::Owner), ("u2@x.com", Role::Member)]);

    let again = h.service.accept_invite(&u2, &created.token).await;
    assert!(matches!(again, Err(Error::InviteInactive)));
    assert_eq!(h.service.list_members(&h.member(&u1, org_id).await?).await?.len(), 2);
    assert_eq!(
        h.service.preview_invite(&created.token).await?.state,
        InviteState::Accepted
    );
    assert!(h.service.list_invites(&owner).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn accepting_after_a_direct_add_keeps_one_membership() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;

    let created = h.service.create_invite(&owner, "u2@x.com").await?;
    h.tick();
    h.service.add_member(&owner, "u2@x.com").await?;
    h.tick();

    let accepted = h.service.accept_invite(&u2, &created.token).await?;
    assert_eq!(accepted.org_id, org_id);
    assert!(!accepted.membership_created);
    assert_eq!(
        h.service.preview_invite(&created.token).await?.state,
        InviteState::Accepted
    );

    let members = h.service.list_members(&h.member(&u2, org_id).await?).await?;
    assert_eq!(members.len(), 2);

    let again = h.service.accept_invite(&u2, &created.token).await;
    assert!(matches!(again, Err(Error::InviteInactive)));
    Ok(())
}

#[tokio::test]
async fn oversized_invite_lifetime_is_capped() -> Result<()> {
    let h = Harness::new();
    let (u1, _u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;

    let service = AdminService::new(
        h.store.clone(),
        h.emails.clone(),
        AdminConfig::new().with_invite_ttl_hours(1_000_000_000_000),
    )
    .with_clock(h.clock.clone());
    assert_eq!(
        service.config().invite_ttl(),
        TimeDelta::hours(MAX_INVITE_TTL_HOURS)
    );

    let created = service.create_invite(&owner, "u2@x.com").await?;
    assert_eq!(
        created.invite.expires_at - created.invite.created_at,
        TimeDelta::hours(MAX_INVITE_TTL_HOURS)
    );
    Ok(())
}

#[tokio::test]
async fn api_gateway_key_is_shown_once_and_revoked_idempotently() -> Result<()> {
    let h = Harness::new();
    let (u1, _u2, org_id) = h.acme().await?;
    let ctx = h.member(&u1, org_id).await?;

    let project = h
        .service
        .create_project(&ctx, "API Gateway", "api-gateway")
        .await?;
    h.tick();
    let created = h
        .service
        .create_api_key(&ctx, project.id, "Usage exporter")
        .await?;
    assert!(created.secret.starts_with(API_KEY_PREFIX));
    assert!(created.secret.ends_with(&created.api_key.key_last4));
    assert_eq!(created.api_key.revoked_at, None);

    let listed = h.service.list_api_keys(&ctx, project.id).await?;
    assert_eq!(listed, vec![created.api_key.clone()]);

    let scope = h.service.authenticate_api_key(&created.secret).await?;
    assert_eq!(scope.project_id, project.id);
    assert_eq!(scope.org_id, org_id);

    let first = h.service.revoke_api_key(&ctx, created.api_key.id).await?;
    h.clock.advance(TimeDelta::hours(1));
    let second = h.service.revoke_api_key(&ctx, created.api_key.id).await?;
    assert!(first.revoked_at.is_some());
    assert_eq!(first.revoked_at, second.revoked_at);

    let rejected = h.service.authenticate_api_key(&created.secret).await;
    assert!(matches!(rejected, Err(Error::InvalidApiKey)));
    Ok(())
}

#[tokio::test]
async fn api_keys_list_newest_first_and_projects_oldest_first() -> Result<()> {
    let h = Harness::new();
    let (u1, _u2, org_id) = h.acme().await?;
    let ctx = h.member(&u1, org_id).await?;

    let first = h.service.create_project(&ctx, "Billing", "billing").await?;
    h.tick();
    let second = h.service.create_project(&ctx, "Search", "search").await?;
    let projects = h.service.list_projects(&ctx).await?;
    assert_eq!(
        projects.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let older = h.service.create_api_key(&ctx, first.id, "older").await?;
    h.tick();
    let newer = h.service.create_api_key(&ctx, first.id, "newer").await?;
    let keys = h.service.list_api_keys(&ctx, first.id).await?;
    assert_eq!(
        keys.iter().map(|k| k.id).collect::<Vec<_>>(),
        vec![newer.api_key.id, older.api_key.id]
    );
    Ok(())
}

#[tokio::test]
async fn promoting_a_member_transfers_ownership_atomically() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme_with_member().await?;
    let owner = h.owner(&u1, org_id).await?;

    let promoted = h
        .service
        .update_member_role(&owner, u2.user_id, Role::Owner)
        .await?;
    assert_eq!(promoted.role, Role::Owner);

    assert_eq!(h.store.owner_count(org_id).await, 1);
    let org = h
        .store
        .find_organization(org_id)
        .await?
        .ok_or_else(|| anyhow!("org missing"))?;
    assert_eq!(org.owner_user_id, u2.user_id);

    let previous = h
        .store
        .find_membership(org_id, u1.user_id)
        .await?
        .ok_or_else(|| anyhow!("u1 membership missing"))?;
    assert_eq!(previous.role, Role::Member);

    let demoted = h.service.owner_context(u1.clone(), org_id).await;
    assert!(matches!(demoted, Err(Error::NotOwner)));
    h.owner(&u2, org_id).await?;
    Ok(())
}

#[tokio::test]
async fn demoting_the_owner_requires_a_transfer_first() -> Result<()> {
    let h = Harness::new();
    let (u1, _u2, org_id) = h.acme_with_member().await?;
    let owner = h.owner(&u1, org_id).await?;

    let result = h
        .service
        .update_member_role(&owner, u1.user_id, Role::Member)
        .await;
    assert!(matches!(result, Err(Error::MustTransferFirst)));

    let row = h
        .store
        .find_membership(org_id, u1.user_id)
        .await?
        .ok_or_else(|| anyhow!("owner membership missing"))?;
    assert_eq!(row.role, Role::Owner);
    assert_eq!(h.store.owner_count(org_id).await, 1);

    let missing = h
        .service
        .update_member_role(&owner, Uuid::new_v4(), Role::Owner)
        .await;
    assert!(matches!(missing, Err(Error::MemberNotFound)));
    Ok(())
}

#[tokio::test]
async fn removing_members_keeps_their_api_keys() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme_with_member().await?;
    let owner = h.owner(&u1, org_id).await?;

    let member = h.member(&u2, org_id).await?;
    let project = h.service.create_project(&member, "Ingest", "ingest").await?;
    let key = h.service.create_api_key(&member, project.id, "collector").await?;

    let result = h.service.remove_member(&owner, u1.user_id).await;
    assert!(matches!(result, Err(Error::CannotRemoveOwner)));

    let result = h.service.remove_member(&owner, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::MemberNotFound)));

    h.service.remove_member(&owner, u2.user_id).await?;
    let gone = h.service.member_context(u2.clone(), org_id).await;
    assert!(matches!(gone, Err(Error::NotAMember)));

    let scope = h.service.authenticate_api_key(&key.secret).await?;
    assert_eq!(scope.project_id, project.id);
    Ok(())
}

#[tokio::test]
async fn add_member_requires_an_existing_non_member_user() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;

    let unknown = h.service.add_member(&owner, "nobody@x.com").await;
    assert!(matches!(unknown, Err(Error::UserNotFound)));

    let added = h.service.add_member(&owner, "U2@x.com").await?;
    assert_eq!(added.user_id, u2.user_id);
    assert_eq!(added.role, Role::Member);

    let twice = h.service.add_member(&owner, "u2@x.com").await;
    assert!(matches!(twice, Err(Error::AlreadyMember)));
    Ok(())
}

#[tokio::test]
async fn second_invite_supersedes_the_pending_one() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;
    let u3 = h.user("u3@x.com", "U3").await;

    let first = h.service.create_invite(&owner, "u2@x.com").await?;
    h.tick();
    let other = h.service.create_invite(&owner, "u3@x.com").await?;
    h.tick();
    let second = h.service.create_invite(&owner, "u2@x.com").await?;

    let pending: Vec<Uuid> = h
        .service
        .list_invites(&owner)
        .await?
        .iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(pending, vec![second.invite.id, other.invite.id]);

    let all = h.store.all_invites(org_id).await;
    assert_eq!(all.len(), 3);
    let revoked: Vec<Uuid> = all
        .iter()
        .filter(|i| i.revoked_at.is_some())
        .map(|i| i.id)
        .collect();
    assert_eq!(revoked, vec![first.invite.id]);

    let stale = h.service.accept_invite(&u2, &first.token).await;
    assert!(matches!(stale, Err(Error::InviteInactive)));
    h.service.accept_invite(&u2, &second.token).await?;
    h.service.accept_invite(&u3, &other.token).await?;
    Ok(())
}

#[tokio::test]
async fn expired_invites_are_rejected_at_the_boundary() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;
    let created = h.service.create_invite(&owner, "u2@x.com").await?;

    h.clock.advance(TimeDelta::days(7));
    let result = h.service.accept_invite(&u2, &created.token).await;
    assert!(matches!(result, Err(Error::InviteExpired)));
    assert_eq!(
        h.service.preview_invite(&created.token).await?.state,
        InviteState::Expired
    );
    assert!(h.service.list_invites(&owner).await?.is_empty());

    // A fresh invite still works after the old one lapsed.
    let renewed = h.service.create_invite(&owner, "u2@x.com").await?;
    h.service.accept_invite(&u2, &renewed.token).await?;
    Ok(())
}

#[tokio::test]
async fn invite_for_another_address_is_refused() -> Result<()> {
    let h = Harness::new();
    let (u1, _u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;
    let u3 = h.user("u3@x.com", "U3").await;

    let created = h.service.create_invite(&owner, "u2@x.com").await?;
    let result = h.service.accept_invite(&u3, &created.token).await;
    assert!(matches!(result, Err(Error::EmailMismatch)));
    assert!(matches!(
        h.service.member_context(u3, org_id).await,
        Err(Error::NotAMember)
    ));

    let unknown = h.service.accept_invite(&u1, "not-a-token").await;
    assert!(matches!(unknown, Err(Error::InviteNotFound)));
    Ok(())
}

#[tokio::test]
async fn revoked_and_accepted_invites_cannot_be_revoked() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;
    let u3 = h.user("u3@x.com", "U3").await;

    let created = h.service.create_invite(&owner, "u2@x.com").await?;
    let revoked = h.service.revoke_invite(&owner, created.invite.id).await?;
    assert_eq!(revoked.id, created.invite.id);
    let twice = h.service.revoke_invite(&owner, created.invite.id).await;
    assert!(matches!(twice, Err(Error::InviteNotFound)));
    let result = h.service.accept_invite(&u2, &created.token).await;
    assert!(matches!(result, Err(Error::InviteInactive)));

    let accepted = h.service.create_invite(&owner, "u3@x.com").await?;
    h.service.accept_invite(&u3, &accepted.token).await?;
    let late = h.service.revoke_invite(&owner, accepted.invite.id).await;
    assert!(matches!(late, Err(Error::InviteNotFound)));
    Ok(())
}

#[tokio::test]
async fn invite_validation_and_member_check() -> Result<()> {
    let h = Harness::new();
    let (u1, _u2, org_id) = h.acme_with_member().await?;
    let owner = h.owner(&u1, org_id).await?;

    let malformed = h.service.create_invite(&owner, "not-an-email").await;
    assert!(matches!(
        malformed,
        Err(Error::InvalidInput { field: "email", .. })
    ));

    let member = h.service.create_invite(&owner, "U2@x.com").await;
    assert!(matches!(member, Err(Error::AlreadyMember)));
    Ok(())
}

#[tokio::test]
async fn email_failure_does_not_fail_the_invite() -> Result<()> {
    let h = Harness::with_sender(RecordingSender {
        fail: true,
        ..RecordingSender::default()
    });
    let (u1, u2, org_id) = h.acme().await?;
    let owner = h.owner(&u1, org_id).await?;

    let created = h.service.create_invite(&owner, "u2@x.com").await?;
    assert_eq!(h.emails.sent.lock().expect("sender lock").len(), 1);
    h.service.accept_invite(&u2, &created.token).await?;
    Ok(())
}

#[tokio::test]
async fn gate_checks_run_in_order() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;

    let token = "session-token-u2";
    h.store
        .insert_session(
            &crate::secrets::hash_secret(token),
            u2.user_id,
            h.clock.now() + TimeDelta::days(1),
        )
        .await;

    assert!(matches!(
        h.service.authenticate(None).await,
        Err(Error::Unauthenticated)
    ));
    assert!(matches!(
        h.service.authenticate(Some("unknown")).await,
        Err(Error::Unauthenticated)
    ));
    let principal = h.service.authenticate(Some(token)).await?;
    assert_eq!(principal.user_id, u2.user_id);

    // Non-members are told the organization does not exist, even for owner-only operations.
    assert!(matches!(
        h.service.owner_context(principal.clone(), org_id).await,
        Err(Error::NotAMember)
    ));
    assert!(matches!(
        h.service.member_context(principal.clone(), Uuid::new_v4()).await,
        Err(Error::NotAMember)
    ));

    let owner = h.owner(&u1, org_id).await?;
    h.service.add_member(&owner, "u2@x.com").await?;
    assert!(matches!(
        h.service.owner_context(principal.clone(), org_id).await,
        Err(Error::NotOwner)
    ));
    let capability = h.service.capability(Some(token), Some(org_id)).await?;
    assert_eq!(capability.level(), crate::gate::Level::OrgMember);

    h.clock.advance(TimeDelta::days(2));
    assert!(matches!(
        h.service.authenticate(Some(token)).await,
        Err(Error::Unauthenticated)
    ));
    Ok(())
}

#[tokio::test]
async fn slugs_and_names_are_validated_server_side() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;

    let taken = h.service.create_organization(&u2, "Acme Two", "acme").await;
    assert!(matches!(taken, Err(Error::SlugConflict("Organization"))));

    let bad_slug = h.service.create_organization(&u2, "Acme Two", "Acme-Two").await;
    assert!(matches!(
        bad_slug,
        Err(Error::InvalidInput { field: "slug", .. })
    ));

    let short_name = h.service.create_organization(&u2, " A ", "acme-two").await;
    assert!(matches!(
        short_name,
        Err(Error::InvalidInput { field: "name", .. })
    ));

    let ctx = h.member(&u1, org_id).await?;
    h.service.create_project(&ctx, "Search", "search").await?;
    let dup = h.service.create_project(&ctx, "Search 2", "search").await;
    assert!(matches!(dup, Err(Error::SlugConflict("Project"))));

    // Project slugs are unique per organization only.
    let other = h.service.create_organization(&u2, "Globex", "globex").await?;
    let other_ctx = h.member(&u2, other.id).await?;
    h.service.create_project(&other_ctx, "Search", "search").await?;
    Ok(())
}

#[tokio::test]
async fn resources_never_cross_organizations() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme().await?;
    let globex = h.service.create_organization(&u2, "Globex", "globex").await?;

    let acme_ctx = h.member(&u1, org_id).await?;
    let globex_ctx = h.member(&u2, globex.id).await?;
    let project = h.service.create_project(&acme_ctx, "Search", "search").await?;
    let key = h.service.create_api_key(&acme_ctx, project.id, "indexer").await?;

    let listed = h.service.list_api_keys(&globex_ctx, project.id).await;
    assert!(matches!(listed, Err(Error::ProjectNotFound)));
    let created = h.service.create_api_key(&globex_ctx, project.id, "sneaky").await;
    assert!(matches!(created, Err(Error::ProjectNotFound)));
    let revoked = h.service.revoke_api_key(&globex_ctx, key.api_key.id).await;
    assert!(matches!(revoked, Err(Error::ApiKeyNotFound)));
    assert!(h.service.list_projects(&globex_ctx).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn my_organizations_lists_every_membership_with_role() -> Result<()> {
    let h = Harness::new();
    let (u1, u2, org_id) = h.acme_with_member().await?;
    let globex = h.service.create_organization(&u2, "Globex", "globex").await?;

    let mine = h.service.list_my_organizations(&u2).await?;
    let summary: Vec<_> = mine.iter().map(|m| (m.org_id, m.role)).collect();
    assert_eq!(summary, vec![(org_id, Role::Member), (globex.id, Role::Owner)]);
    assert_eq!(h.service.list_my_organizations(&u1).await?.len(), 1);
    Ok(())
}

#[test]
fn admin_config_normalizes_invalid_values() {
    let config = AdminConfig::new()
        .with_frontend_base_url("https://app.example.com/ ")
        .with_invite_ttl_hours(0)
        .normalize();
    assert_eq!(config.frontend_base_url(), "https://app.example.com");
    assert_eq!(config.invite_ttl(), TimeDelta::days(7));

    let config = AdminConfig::new()
        .with_invite_ttl_hours(MAX_INVITE_TTL_HOURS + 1)
        .normalize();
    assert_eq!(config.invite_ttl(), TimeDelta::days(365));

    let config = AdminConfig::new().with_invite_ttl_hours(48).normalize();
    assert_eq!(config.invite_ttl(), TimeDelta::hours(48));
    assert_eq!(config.frontend_base_url(), "http://localhost:3000");
}
