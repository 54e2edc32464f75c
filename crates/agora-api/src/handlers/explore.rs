//! Explore endpoints.

use std::str::FromStr;
use std::time::Duration;

use agora_core::{Caller, EntityKind, ExploreAllResult, ExploreResult};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::query_types::parse_explore_params;
use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/v1/explore`
pub async fn explore_all(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ExploreAllResult>, ApiError> {
    let caller = caller(&state, &headers);
    let requests = parse_explore_params(pairs)?;
    let (cancel, _guard) = request_token(state.config.request_timeout);

    let result = state.engine.explore_all(requests, caller, &cancel).await?;
    Ok(Json(result))
}

/// `GET /api/v1/explore/:kind`
pub async fn explore_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ExploreResult>, ApiError> {
    let kind = parse_kind(&kind)?;
    let caller = caller(&state, &headers);
    let mut requests = parse_explore_params(pairs)?;
    let raw = requests.remove(&kind).unwrap_or_default();
    let (cancel, _guard) = request_token(state.config.request_timeout);

    let result = state.engine.explore(kind, raw, caller, &cancel).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    pub id: Option<Uuid>,
}

/// `POST /api/v1/explore/:kind/filter-vectors/refresh[?id=<uuid>]`
pub async fn refresh_filter_vectors(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RefreshQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_authenticated(&state, &headers)?;
    let kind = parse_kind(&kind)?;

    let updated = state
        .refresher
        .refresh_filter_vectors(kind, query.id)
        .await?;
    info!(
        subsystem = "api",
        entity_kind = %kind,
        id = ?query.id,
        updated,
        "Filter vectors refreshed"
    );

    Ok(Json(serde_json::json!({
        "kind": kind,
        "updated": updated,
    })))
}

/// `POST /api/v1/explore/catalog/reload`
pub async fn reload_catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_authenticated(&state, &headers)?;
    let values = state.engine.reload_catalog().await?;
    Ok(Json(serde_json::json!({ "values": values })))
}

fn parse_kind(kind: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_str(kind).map_err(|_| ApiError::NotFound(format!("Unknown entity kind: {}", kind)))
}

/// Caller identity from the trusted user header. A malformed id counts as
/// anonymous.
fn caller(state: &AppState, headers: &HeaderMap) -> Caller {
    let Some(value) = headers.get(&state.config.auth_user_header) else {
        return Caller::anonymous();
    };
    match value.to_str().ok().and_then(|v| Uuid::parse_str(v.trim()).ok()) {
        Some(user_id) => Caller::authenticated(user_id),
        None => {
            warn!(
                subsystem = "api",
                header = %state.config.auth_user_header,
                "Malformed user id header, treating caller as anonymous"
            );
            Caller::anonymous()
        }
    }
}

fn require_authenticated(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let caller = caller(state, headers);
    if !caller.is_authenticated() {
        return Err(ApiError::Unauthorized("Authentication required".to_string()));
    }
    Ok(caller)
}

/// Token cancelled after `timeout`, or when the returned guard drops because
/// the handler finished or the client went away.
fn request_token(timeout: Duration) -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                warn!(subsystem = "api", timeout_ms = timeout.as_millis() as u64, "Explore request timed out");
                timer.cancel();
            }
        }
    });
    let guard = token.clone().drop_guard();
    (token, guard)
}
