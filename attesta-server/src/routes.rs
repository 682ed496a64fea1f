//! Route table and middleware stack.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{
    create_audit_handler, create_record_handler, destroy_audit_handler, get_attachment_handler,
    get_audit_handler, get_record_handler, health, list_audit_handler, ready,
    update_audit_handler, update_record_handler, upload_attachment_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// In-memory router with default settings, used by tests.
pub fn create_router() -> Router {
    create_router_with_config(&Config::default())
}

pub fn create_router_with_config(config: &Config) -> Router {
    create_router_with_state(AppState::in_memory(config), config)
}

pub fn create_router_with_state(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes(state))
        .layer(cors_layer(config.allowed_origins.as_deref()))
        .layer(RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid));

    with_rate_limit(router, config).layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/capture-audit",
            post(create_audit_handler).get(list_audit_handler),
        )
        .route(
            "/api/capture-audit/{id}",
            get(get_audit_handler)
                .put(update_audit_handler)
                .patch(update_audit_handler)
                .delete(destroy_audit_handler),
        )
        .route("/api/attachments", post(upload_attachment_handler))
        .route("/api/attachments/{id}", get(get_attachment_handler))
        .route("/api/records/{collection}", post(create_record_handler))
        .route(
            "/api/records/{collection}/{id}",
            get(get_record_handler).patch(update_record_handler),
        )
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

/// Unparseable origins are dropped. No usable origin means any origin.
fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS: any origin allowed");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    tracing::info!(origins = origins.len(), "CORS: origin allow-list active");
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

fn with_rate_limit(router: Router, config: &Config) -> Router {
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting disabled");
        return router;
    }

    let Some(governor) = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish()
    else {
        tracing::error!(
            per_sec = config.rate_limit_per_sec,
            burst = config.rate_limit_burst,
            "Rate limit settings rejected, running without a limit"
        );
        return router;
    };

    tracing::info!(
        per_sec = config.rate_limit_per_sec,
        burst = config.rate_limit_burst,
        "Rate limiting enabled"
    );
    router.layer(GovernorLayer::new(Arc::new(governor)))
}
