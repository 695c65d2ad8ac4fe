//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{error, warn};

use crate::client::{ClientError, FuelPrice, FuelStation, MIN_BATCH_NUMBER, Transport};
use crate::service::{FuelStationNode, Snapshot};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<T: Transport + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status::<T>))
        .route("/pfs", get(fuel_stations::<T>))
        .route("/pfs/all", get(all_fuel_stations::<T>))
        .route("/pfs/fuel-prices", get(fuel_prices::<T>))
        .route("/pfs/fuel-prices/all", get(all_fuel_prices::<T>))
        .route("/nodes", get(nodes::<T>))
        .route("/nodes/:node_id", get(node::<T>))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Registry size and refresh state.
async fn status<T: Transport + 'static>(State(state): State<AppState<T>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        nodes: state.service.len().await,
        last_refresh: state.service.last_refresh().await,
        scheduled: state.service.is_started().await,
        refreshing: state.service.is_refreshing(),
    })
}

/// One batch of station metadata.
async fn fuel_stations<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<Vec<FuelStation>>, AppError> {
    let batch = batch_number(&query)?;
    let stations = state.client().get_fuel_stations(batch, query.since).await?;
    Ok(Json(stations))
}

/// Every batch of station metadata.
async fn all_fuel_stations<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Result<Json<Vec<FuelStation>>, AppError> {
    Ok(Json(state.client().get_all_fuel_stations().await?))
}

/// One batch of prices.
async fn fuel_prices<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<Vec<FuelPrice>>, AppError> {
    let batch = batch_number(&query)?;
    let prices = state.client().get_fuel_prices(batch, query.since).await?;
    Ok(Json(prices))
}

/// Every batch of prices.
async fn all_fuel_prices<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Result<Json<Vec<FuelPrice>>, AppError> {
    Ok(Json(state.client().get_all_fuel_prices().await?))
}

/// The whole registry with its refresh watermark.
async fn nodes<T: Transport + 'static>(State(state): State<AppState<T>>) -> Json<Snapshot> {
    Json(state.service.snapshot().await)
}

/// One node by id.
async fn node<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Path(node_id): Path<String>,
) -> Result<Json<FuelStationNode>, AppError> {
    state
        .service
        .node(&node_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Unknown node: {}", node_id),
        })
}

fn batch_number(query: &BatchQuery) -> Result<u32, AppError> {
    match query.batch_number {
        Some(n) if n < MIN_BATCH_NUMBER => Err(AppError::BadRequest {
            message: format!("batch-number must be at least {}", MIN_BATCH_NUMBER),
        }),
        Some(n) => Ok(n),
        None => Ok(MIN_BATCH_NUMBER),
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Upstream(ClientError),
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        AppError::Upstream(e)
    }
}

impl AppError {
    /// Status code this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Upstream(e) => match e {
                ClientError::Authentication { .. } => StatusCode::UNAUTHORIZED,
                ClientError::Network { .. }
                | ClientError::HttpStatus { .. }
                | ClientError::Json { .. } => StatusCode::BAD_GATEWAY,
                ClientError::Configuration { .. } | ClientError::InvalidUrl { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest { message } | AppError::NotFound { message } => message,
            AppError::Upstream(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), %message, "request failed");
        } else {
            warn!(status = status.as_u16(), %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
