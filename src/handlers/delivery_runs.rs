use super::{loading_batches::AddNoteRequest, ExpandQuery};
use crate::{
    errors::ServiceError,
    models::{delivery_run, shipment_note, RunStatus},
    services::delivery_runs::{CompleteDeliveryRun, DeliveryRunView, OpenDeliveryRun},
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

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RunListQuery {
    pub branch: Option<String>,
    pub status: Option<RunStatus>,
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-runs",
    request_body = OpenDeliveryRun,
    responses(
        (status = 201, description = "Run opened on the next waiting vehicle", body = ApiResponse<delivery_run::Model>),
        (status = 409, description = "No vehicle waiting at the branch", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-runs"
)]
pub async fn open_run(
    State(state): State<AppState>,
    Json(payload): Json<OpenDeliveryRun>,
) -> Result<(StatusCode, Json<ApiResponse<delivery_run::Model>>), ServiceError> {
    let run = state.services.delivery_runs.open_run(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(run))))
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-runs",
    params(RunListQuery),
    responses(
        (status = 200, description = "Delivery runs listed", body = ApiResponse<Vec<delivery_run::Model>>)
    ),
    tag = "delivery-runs"
)]
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunListQuery>,
) -> ApiResult<Vec<delivery_run::Model>> {
    let runs = state
        .services
        .delivery_runs
        .list_runs(query.branch.as_deref(), query.status)
        .await?;
    Ok(Json(ApiResponse::success(runs)))
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-runs/:id",
    params(("id" = Uuid, Path, description = "Delivery run ID"), ExpandQuery),
    responses(
        (status = 200, description = "Run with vehicle and notes", body = ApiResponse<DeliveryRunView>),
        (status = 404, description = "Delivery run not found", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-runs"
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExpandQuery>,
) -> ApiResult<DeliveryRunView> {
    let view = state.services.delivery_runs.get_run(id, query.expand).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-runs/:id/notes",
    params(("id" = Uuid, Path, description = "Delivery run ID")),
    request_body = AddNoteRequest,
    responses(
        (status = 200, description = "Note out for delivery, now LANSIR", body = ApiResponse<shipment_note::Model>),
        (status = 409, description = "Note already assigned or run not open", body = crate::errors::ErrorResponse),
        (status = 422, description = "Note not eligible for this run", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-runs"
)]
pub async fn add_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNoteRequest>,
) -> ApiResult<shipment_note::Model> {
    let note = state
        .services
        .delivery_runs
        .add_note(id, payload.note_id)
        .await?;
    Ok(Json(ApiResponse::success(note)))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-runs/:id/dispatch",
    params(("id" = Uuid, Path, description = "Delivery run ID")),
    responses(
        (status = 200, description = "Run dispatched", body = ApiResponse<delivery_run::Model>),
        (status = 409, description = "Run not open or empty", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-runs"
)]
pub async fn dispatch_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<delivery_run::Model> {
    let run = state.services.delivery_runs.dispatch(id).await?;
    Ok(Json(ApiResponse::success(run)))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-runs/:id/complete",
    params(("id" = Uuid, Path, description = "Delivery run ID")),
    request_body = CompleteDeliveryRun,
    responses(
        (status = 200, description = "Run completed, vehicle RETURNED", body = ApiResponse<delivery_run::Model>),
        (status = 400, description = "Outcomes do not match the run's notes", body = crate::errors::ErrorResponse),
        (status = 409, description = "Run not dispatched", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-runs"
)]
pub async fn complete_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteDeliveryRun>,
) -> ApiResult<delivery_run::Model> {
    let run = state.services.delivery_runs.complete(id, payload).await?;
    Ok(Json(ApiResponse::success(run)))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery-runs/:id/cancel",
    params(("id" = Uuid, Path, description = "Delivery run ID")),
    responses(
        (status = 200, description = "Empty run cancelled", body = ApiResponse<delivery_run::Model>),
        (status = 409, description = "Run not open or not empty", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-runs"
)]
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<delivery_run::Model> {
    let run = state.services.delivery_runs.cancel(id).await?;
    Ok(Json(ApiResponse::success(run)))
}
