pub mod config;
pub mod directions;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod models;
pub mod polyline;
pub mod proximity;
pub mod safety;
pub mod service;
pub mod smoothing;
pub mod synthesis;
pub mod synthetic_points;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::error::RouteError;
use crate::models::{ApiError, ProviderSwitch, SafeRouteRequest, TransportMode};
use crate::service::SafeRouteService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SafeRouteService>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/safe-route", post(safe_route_handler))
        .route("/api/provider", get(get_provider_handler).put(set_provider_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn safe_route_handler(
    State(state): State<AppState>,
    payload: Result<Json<SafeRouteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let Json(req) = payload.map_err(|rejection| {
        api_error(RouteError::InvalidInput(rejection.body_text()))
    })?;
    let mode: TransportMode = req.mode.parse().map_err(|err| api_error(RouteError::from(err)))?;
    let response = state
        .service
        .compute_safe_route(req.origin, req.destination, mode)
        .await
        .map_err(api_error)?;

    Ok(Json(response))
}

async fn get_provider_handler(State(state): State<AppState>) -> Json<ProviderSwitch> {
    Json(ProviderSwitch {
        enabled: state.service.provider_enabled(),
    })
}

async fn set_provider_handler(
    State(state): State<AppState>,
    Json(switch): Json<ProviderSwitch>,
) -> Json<ProviderSwitch> {
    state.service.set_provider_enabled(switch.enabled);
    Json(ProviderSwitch {
        enabled: state.service.provider_enabled(),
    })
}

async fn health_handler() -> &'static str {
    "OK"
}

fn api_error(err: RouteError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        RouteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RouteError::Gpx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("safe route request failed: {err}");
    }
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
