use super::ExpandQuery;
use crate::{
    errors::ServiceError,
    models::{loading_batch, shipment_note, BatchStatus},
    services::loading_batches::{LoadingBatchView, OpenLoadingBatch},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BatchListQuery {
    pub origin: Option<String>,
    pub status: Option<BatchStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddNoteRequest {
    pub note_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v1/loading-batches",
    request_body = OpenLoadingBatch,
    responses(
        (status = 201, description = "Loading batch opened", body = ApiResponse<loading_batch::Model>),
        (status = 409, description = "Truck is not waiting", body = crate::errors::ErrorResponse),
        (status = 422, description = "Truck does not serve the origin loading queue", body = crate::errors::ErrorResponse)
    ),
    tag = "loading-batches"
)]
pub async fn open_batch(
    State(state): State<AppState>,
    Json(payload): Json<OpenLoadingBatch>,
) -> Result<(StatusCode, Json<ApiResponse<loading_batch::Model>>), ServiceError> {
    let batch = state.services.loading_batches.open_batch(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(batch))))
}

#[utoipa::path(
    get,
    path = "/api/v1/loading-batches",
    params(BatchListQuery),
    responses(
        (status = 200, description = "Loading batches listed", body = ApiResponse<Vec<loading_batch::Model>>)
    ),
    tag = "loading-batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchListQuery>,
) -> ApiResult<Vec<loading_batch::Model>> {
    let batches = state
        .services
        .loading_batches
        .list_batches(query.origin.as_deref(), query.status)
        .await?;
    Ok(Json(ApiResponse::success(batches)))
}

#[utoipa::path(
    get,
    path = "/api/v1/loading-batches/:id",
    params(("id" = Uuid, Path, description = "Loading batch ID"), ExpandQuery),
    responses(
        (status = 200, description = "Loading batch with truck and notes", body = ApiResponse<LoadingBatchView>),
        (status = 404, description = "Loading batch not found", body = crate::errors::ErrorResponse)
    ),
    tag = "loading-batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExpandQuery>,
) -> ApiResult<LoadingBatchView> {
    let view = state
        .services
        .loading_batches
        .get_batch(id, query.expand)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/loading-batches/:id/notes",
    params(("id" = Uuid, Path, description = "Loading batch ID")),
    request_body = AddNoteRequest,
    responses(
        (status = 200, description = "Note loaded, now MUAT", body = ApiResponse<shipment_note::Model>),
        (status = 409, description = "Note or batch in the wrong status", body = crate::errors::ErrorResponse),
        (status = 422, description = "Note route does not match the batch", body = crate::errors::ErrorResponse)
    ),
    tag = "loading-batches"
)]
pub async fn add_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNoteRequest>,
) -> ApiResult<shipment_note::Model> {
    let note = state
        .services
        .loading_batches
        .add_note(id, payload.note_id)
        .await?;
    Ok(Json(ApiResponse::success(note)))
}

#[utoipa::path(
    post,
    path = "/api/v1/loading-batches/:id/depart",
    params(("id" = Uuid, Path, description = "Loading batch ID")),
    responses(
        (status = 200, description = "Batch departed, notes in TRANSIT", body = ApiResponse<loading_batch::Model>),
        (status = 409, description = "Batch not open or empty", body = crate::errors::ErrorResponse)
    ),
    tag = "loading-batches"
)]
pub async fn depart_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<loading_batch::Model> {
    let batch = state.services.loading_batches.depart(id).await?;
    Ok(Json(ApiResponse::success(batch)))
}

#[utoipa::path(
    post,
    path = "/api/v1/loading-batches/:id/arrive",
    params(("id" = Uuid, Path, description = "Loading batch ID")),
    responses(
        (status = 200, description = "Batch arrived at destination", body = ApiResponse<loading_batch::Model>),
        (status = 409, description = "Batch has not departed", body = crate::errors::ErrorResponse)
    ),
    tag = "loading-batches"
)]
pub async fn arrive_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<loading_batch::Model> {
    let batch = state.services.loading_batches.arrive(id).await?;
    Ok(Json(ApiResponse::success(batch)))
}

#[utoipa::path(
    post,
    path = "/api/v1/loading-batches/:id/cancel",
    params(("id" = Uuid, Path, description = "Loading batch ID")),
    responses(
        (status = 200, description = "Empty batch cancelled", body = ApiResponse<loading_batch::Model>),
        (status = 409, description = "Batch not open or not empty", body = crate::errors::ErrorResponse)
    ),
    tag = "loading-batches"
)]
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<loading_batch::Model> {
    let batch = state.services.loading_batches.cancel(id).await?;
    Ok(Json(ApiResponse::success(batch)))
}
