use crate::{
    errors::ServiceError,
    models::{vehicle_queue_entry, QueueKind},
    services::vehicle_queue::RegisterVehicle,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueListQuery {
    pub branch: String,
    pub kind: Option<QueueKind>,
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicle-queue",
    params(QueueListQuery),
    responses(
        (status = 200, description = "Branch queue in FIFO order", body = ApiResponse<Vec<vehicle_queue_entry::Model>>)
    ),
    tag = "vehicle-queue"
)]
pub async fn list_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueListQuery>,
) -> ApiResult<Vec<vehicle_queue_entry::Model>> {
    let entries = state
        .services
        .vehicle_queue
        .list_queue(&query.branch, query.kind)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

#[utoipa::path(
    post,
    path = "/api/v1/vehicle-queue",
    request_body = RegisterVehicle,
    responses(
        (status = 201, description = "Vehicle added at the tail of the queue", body = ApiResponse<vehicle_queue_entry::Model>),
        (status = 409, description = "Vehicle already registered at the branch", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicle-queue"
)]
pub async fn register_vehicle(
    State(state): State<AppState>,
    Json(payload): Json<RegisterVehicle>,
) -> Result<(StatusCode, Json<ApiResponse<vehicle_queue_entry::Model>>), ServiceError> {
    let entry = state.services.vehicle_queue.register(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicle-queue/:id",
    params(("id" = Uuid, Path, description = "Queue entry ID")),
    responses(
        (status = 200, description = "Queue entry", body = ApiResponse<vehicle_queue_entry::Model>),
        (status = 404, description = "Queue entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicle-queue"
)]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<vehicle_queue_entry::Model> {
    let entry = state.services.vehicle_queue.get_entry(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    post,
    path = "/api/v1/vehicle-queue/:id/requeue",
    params(("id" = Uuid, Path, description = "Queue entry ID")),
    responses(
        (status = 200, description = "Vehicle back in the queue with a fresh sequence number", body = ApiResponse<vehicle_queue_entry::Model>),
        (status = 409, description = "Vehicle is not RETURNED", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicle-queue"
)]
pub async fn requeue_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<vehicle_queue_entry::Model> {
    let entry = state.services.vehicle_queue.requeue(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/vehicle-queue/:id",
    params(("id" = Uuid, Path, description = "Queue entry ID")),
    responses(
        (status = 204, description = "Vehicle decommissioned"),
        (status = 409, description = "Vehicle is out on a run", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicle-queue"
)]
pub async fn decommission_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.vehicle_queue.decommission(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
