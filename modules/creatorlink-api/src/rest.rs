//! HTTP handlers for the linking flow and account reads/updates.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use creatorlink_common::{AccountPatch, Platform, UnknownPlatform};
use creatorlink_linking::{complete_link, enriched_account, CallbackParams, LinkError};
use creatorlink_store::StoreError;
use social_client::ProviderAdapter;

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct AuthQuery {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

// --- Helpers ---

fn error_body(error: &str, details: impl ToString) -> Json<Value> {
    Json(json!({ "error": error, "details": details.to_string() }))
}

fn parse_platform(raw: &str) -> Result<Platform, Response> {
    raw.parse().map_err(|e: UnknownPlatform| {
        (StatusCode::BAD_REQUEST, error_body("unknown platform", e)).into_response()
    })
}

// --- Handlers ---

/// `GET /{platform}/auth?user_id=...` — 302 to the provider consent page.
pub async fn start_auth(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    Query(query): Query<AuthQuery>,
) -> Response {
    let platform = match parse_platform(&platform) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if query.user_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("invalid request", "user_id is required"),
        )
            .into_response();
    }

    match state.registry.adapter(platform).authorization_url(&query.user_id) {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(e) => {
            warn!(%platform, error = %e, "failed to build authorization URL");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("authorization failed", e),
            )
                .into_response()
        }
    }
}

/// `POST /{platform}/auth` — stage listing fields for the user, then hand
/// back the consent URL. The staged fields resurface in the callback.
pub async fn stage_and_start_auth(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    Json(mut body): Json<Value>,
) -> Response {
    let platform = match parse_platform(&platform) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let user_id = match body.get("user_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                error_body("invalid request", "user_id is required"),
            )
                .into_response()
        }
    };
    if let Some(obj) = body.as_object_mut() {
        obj.remove("user_id");
    }

    if let Err(e) = state.pending.stage(&user_id, body).await {
        warn!(%platform, user_id, error = %e, "failed to stage pending registration");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("registration staging failed", e),
        )
            .into_response();
    }

    match state.registry.adapter(platform).authorization_url(&user_id) {
        Ok(url) => Json(json!({ "authorization_url": url.as_str() })).into_response(),
        Err(e) => {
            warn!(%platform, error = %e, "failed to build authorization URL");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("authorization failed", e),
            )
                .into_response()
        }
    }
}

/// `GET /cb/{platform}?code=...&state=...` — completes the link, then 302
/// to the configured front-end URL. Failures come back as JSON, not a
/// success redirect.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let platform = match parse_platform(&platform) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let adapter = state.registry.adapter(platform);
    let params = CallbackParams {
        code: query.code,
        state: query.state,
    };

    match complete_link(adapter, &state.accounts, &state.pending, params).await {
        Ok(_) => Redirect::temporary(&state.link_success_url).into_response(),
        Err(LinkError::MissingParam(param)) => (
            StatusCode::BAD_REQUEST,
            error_body("missing callback parameter", param),
        )
            .into_response(),
        Err(e) => {
            warn!(%platform, error = %e, "account linking failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("account linking failed", e),
            )
                .into_response()
        }
    }
}

/// `GET /accounts/{id}` — the enriched view, cache-fronted.
pub async fn account_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match enriched_account(&state.registry, &state.accounts, &state.enrichment, id).await {
        Ok(view) => Json(view).into_response(),
        Err(LinkError::AccountNotFound(_)) => {
            (StatusCode::NOT_FOUND, error_body("account not found", id)).into_response()
        }
        Err(LinkError::Provider(e)) => {
            warn!(%id, error = %e, "enrichment failed at the provider");
            (StatusCode::BAD_GATEWAY, error_body("enrichment failed", e)).into_response()
        }
        Err(e) => {
            warn!(%id, error = %e, "enrichment failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("enrichment failed", e),
            )
                .into_response()
        }
    }
}

/// `PATCH /accounts/{id}` — partial update, then enrichment-cache
/// invalidation for that id. Every account mutation must drop the cached
/// view or reads serve stale listing data for up to an hour.
pub async fn account_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AccountPatch>,
) -> Response {
    match state.accounts.apply_patch(id, &patch).await {
        Ok(account) => {
            if let Err(e) = state.enrichment.invalidate(id).await {
                warn!(%id, error = %e, "account updated but cache invalidation failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("cache invalidation failed", e),
                )
                    .into_response();
            }
            Json(account).into_response()
        }
        Err(StoreError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, error_body("account not found", id)).into_response()
        }
        Err(e) => {
            warn!(%id, error = %e, "account update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("account update failed", e),
            )
                .into_response()
        }
    }
}

/// `DELETE /accounts/{id}` — soft delete plus cache invalidation.
pub async fn account_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.accounts.soft_delete(id).await {
        Ok(()) => {
            if let Err(e) = state.enrichment.invalidate(id).await {
                warn!(%id, error = %e, "account deleted but cache invalidation failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("cache invalidation failed", e),
                )
                    .into_response();
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(StoreError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, error_body("account not found", id)).into_response()
        }
        Err(e) => {
            warn!(%id, error = %e, "account delete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("account delete failed", e),
            )
                .into_response()
        }
    }
}
