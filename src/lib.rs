//! Freight dispatch API
//!
//! Shipment-note (STT) lifecycle and vehicle-queue orchestration for
//! inter-branch freight: loading batches, delivery runs, tracking and the
//! invoicing feed.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::errors::ServiceError;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service over `db` and wraps them in shared state.
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn pagination_rounds_total_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);

        let empty = PaginatedResponse::<u8>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let shipment_notes = Router::new()
        .route(
            "/shipment-notes",
            get(handlers::shipment_notes::list_notes).post(handlers::shipment_notes::create_note),
        )
        .route(
            "/eligible-notes/batch",
            get(handlers::shipment_notes::eligible_for_batch),
        )
        .route(
            "/eligible-notes/run",
            get(handlers::shipment_notes::eligible_for_run),
        )
        .route("/shipment-notes/:id", get(handlers::shipment_notes::get_note))
        .route(
            "/shipment-notes/:id/return",
            post(handlers::shipment_notes::return_note),
        )
        .route(
            "/tracking/:note_number",
            get(handlers::shipment_notes::track_note),
        );

    let vehicle_queue = Router::new()
        .route(
            "/vehicle-queue",
            get(handlers::vehicle_queue::list_queue).post(handlers::vehicle_queue::register_vehicle),
        )
        .route(
            "/vehicle-queue/:id",
            get(handlers::vehicle_queue::get_entry)
                .delete(handlers::vehicle_queue::decommission_vehicle),
        )
        .route(
            "/vehicle-queue/:id/requeue",
            post(handlers::vehicle_queue::requeue_vehicle),
        );

    let loading_batches = Router::new()
        .route(
            "/loading-batches",
            get(handlers::loading_batches::list_batches)
                .post(handlers::loading_batches::open_batch),
        )
        .route(
            "/loading-batches/:id",
            get(handlers::loading_batches::get_batch),
        )
        .route(
            "/loading-batches/:id/notes",
            post(handlers::loading_batches::add_note),
        )
        .route(
            "/loading-batches/:id/depart",
            post(handlers::loading_batches::depart_batch),
        )
        .route(
            "/loading-batches/:id/arrive",
            post(handlers::loading_batches::arrive_batch),
        )
        .route(
            "/loading-batches/:id/cancel",
            post(handlers::loading_batches::cancel_batch),
        );

    let delivery_runs = Router::new()
        .route(
            "/delivery-runs",
            get(handlers::delivery_runs::list_runs).post(handlers::delivery_runs::open_run),
        )
        .route("/delivery-runs/:id", get(handlers::delivery_runs::get_run))
        .route(
            "/delivery-runs/:id/notes",
            post(handlers::delivery_runs::add_note),
        )
        .route(
            "/delivery-runs/:id/dispatch",
            post(handlers::delivery_runs::dispatch_run),
        )
        .route(
            "/delivery-runs/:id/complete",
            post(handlers::delivery_runs::complete_run),
        )
        .route(
            "/delivery-runs/:id/cancel",
            post(handlers::delivery_runs::cancel_run),
        );

    let invoicing = Router::new().route(
        "/invoicing/notes",
        get(handlers::invoicing::notes_for_invoice),
    );

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(shipment_notes)
        .merge(vehicle_queue)
        .merge(loading_batches)
        .merge(delivery_runs)
        .merge(invoicing)
}

/// CORS policy from configuration: explicit origins win, otherwise the
/// permissive fallback when the environment allows it.
pub fn cors_layer(cfg: &config::AppConfig) -> Result<CorsLayer, ServiceError> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        Err(ServiceError::InternalError(
            "missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
                .to_string(),
        ))
    }
}

/// Full application router: v1 API, OpenAPI document and the shared layers.
pub fn build_router(state: AppState) -> Result<Router, ServiceError> {
    let cors = cors_layer(&state.config)?;
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Ok(Router::new()
        .route("/", get(|| async { "freight-dispatch-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::openapi_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        // Outermost so every inner layer and handler sees the request id
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state))
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "freight-dispatch-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
