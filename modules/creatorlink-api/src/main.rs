use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use creatorlink_common::Config;
use creatorlink_linking::{AccountStore, EnrichmentCache, PendingRegistrations};
use creatorlink_store::{PgDocumentStore, PgKvCache};
use social_client::ProviderRegistry;

mod rest;

pub struct AppState {
    pub registry: ProviderRegistry,
    pub accounts: AccountStore<PgDocumentStore>,
    pub pending: PendingRegistrations<PgKvCache>,
    pub enrichment: EnrichmentCache<PgKvCache>,
    pub link_success_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;
    creatorlink_store::ensure_schema(&pool).await?;

    let registry = ProviderRegistry::from_config(&config, reqwest::Client::new());

    let state = Arc::new(AppState {
        registry,
        accounts: AccountStore::new(PgDocumentStore::new(pool.clone())),
        pending: PendingRegistrations::new(PgKvCache::new(pool.clone())),
        enrichment: EnrichmentCache::new(PgKvCache::new(pool)),
        link_success_url: config.link_success_url.clone(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Linking flow
        .route(
            "/{platform}/auth",
            get(rest::start_auth).post(rest::stage_and_start_auth),
        )
        .route("/cb/{platform}", get(rest::oauth_callback))
        // Accounts
        .route(
            "/accounts/{id}",
            get(rest::account_detail)
                .patch(rest::account_update)
                .delete(rest::account_delete),
        )
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only (no query
        // params — callback URLs carry authorization codes)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("CreatorLink API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
