//! HTTP surface: router construction and the server entry point.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::{delete, get, patch, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::email::LogEmailSender;
use crate::store::PgStore;
use crate::{AdminConfig, AdminService};

pub mod handlers;
mod openapi;
pub mod session;

pub use openapi::{openapi, ApiDoc};

use handlers::{api_keys, health, invites, members, orgs, projects};

/// Build the application router around a ready `AdminService`.
#[must_use]
pub fn router(service: Arc<AdminService>) -> Router {
    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/v1/orgs", post(orgs::create_org).get(orgs::list_orgs))
        .route(
            "/v1/orgs/:org_id/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/v1/orgs/:org_id/members/:user_id",
            patch(members::update_member_role).delete(members::remove_member),
        )
        .route(
            "/v1/orgs/:org_id/invites",
            get(invites::list_invites).post(invites::create_invite),
        )
        .route(
            "/v1/orgs/:org_id/invites/:invite_id",
            delete(invites::revoke_invite),
        )
        .route("/v1/invites/accept", post(invites::accept_invite))
        .route("/v1/invites/:token", get(invites::preview_invite))
        .route(
            "/v1/orgs/:org_id/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/v1/orgs/:org_id/projects/:project_id/api-keys",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route(
            "/v1/orgs/:org_id/api-keys/:api_key_id",
            delete(api_keys::revoke_api_key),
        )
        .route("/v1/api-keys/introspect", post(api_keys::introspect))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(service)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to connect to the database or bind the port
pub async fn new(
    port: u16,
    dsn: &SecretString,
    max_connections: u32,
    config: AdminConfig,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store
        .apply_schema()
        .await
        .context("Failed to apply database schema")?;

    let service = Arc::new(AdminService::new(
        Arc::new(store),
        Arc::new(LogEmailSender),
        config,
    ));

    let app = router(service);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
