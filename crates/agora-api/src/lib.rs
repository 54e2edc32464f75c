//! # agora-api
//!
//! HTTP surface of the agora explore engine.

pub mod error;
pub mod handlers;
pub mod query_types;

use std::sync::Arc;
use std::time::Duration;

use agora_core::{FilterVectorRefresher, Result};
use agora_search::ExploreEngine;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use error::ApiError;

/// Header carrying the authenticated user id when none is configured.
pub const DEFAULT_AUTH_USER_HEADER: &str = "x-user-id";

/// Default per-request deadline for explore searches.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Trusted header set by the upstream session provider.
    pub auth_user_header: HeaderName,
    pub allowed_origins: Vec<HeaderValue>,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            auth_user_header: HeaderName::from_static(DEFAULT_AUTH_USER_HEADER),
            allowed_origins: Vec::new(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ApiConfig {
    /// Reads `HOST`, `PORT`, `AUTH_USER_HEADER`, `ALLOWED_ORIGINS` and
    /// `REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match std::env::var("PORT") {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|_| agora_core::Error::Config(format!("Invalid PORT: {}", val)))?,
            Err(_) => defaults.port,
        };

        let auth_user_header = match std::env::var("AUTH_USER_HEADER") {
            Ok(val) if !val.trim().is_empty() => {
                HeaderName::try_from(val.trim().to_lowercase()).map_err(|e| {
                    agora_core::Error::Config(format!("Invalid AUTH_USER_HEADER: {}", e))
                })?
            }
            _ => defaults.auth_user_header,
        };

        let request_timeout = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port,
            auth_user_header,
            allowed_origins: parse_allowed_origins(
                &std::env::var("ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            request_timeout,
        })
    }
}

/// Parse a comma-separated origin list, skipping invalid entries.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExploreEngine>,
    pub refresher: Arc<dyn FilterVectorRefresher>,
    pub config: Arc<ApiConfig>,
}

/// Build the router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.config.allowed_origins.clone()))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/explore", get(handlers::explore_all))
        .route("/api/v1/explore/catalog/reload", post(handlers::reload_catalog))
        .route("/api/v1/explore/:kind", get(handlers::explore_kind))
        .route(
            "/api/v1/explore/:kind/filter-vectors/refresh",
            post(handlers::refresh_filter_vectors),
        )
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .with_state(state)
}
