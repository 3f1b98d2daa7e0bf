use crate::{
    errors::ServiceError,
    models::{shipment_note, NoteStatus},
    services::shipment_notes::{NewShipmentNote, ShipmentTracking},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentNoteListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<NoteStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BatchEligibilityQuery {
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RunEligibilityQuery {
    pub branch: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/shipment-notes",
    request_body = NewShipmentNote,
    responses(
        (status = 201, description = "Shipment note created in PENDING", body = ApiResponse<shipment_note::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "shipment-notes"
)]
pub async fn create_note(
    State(state): State<AppState>,
    Json(payload): Json<NewShipmentNote>,
) -> Result<(StatusCode, Json<ApiResponse<shipment_note::Model>>), ServiceError> {
    let note = state.services.shipment_notes.create_note(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(note))))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipment-notes",
    params(ShipmentNoteListQuery),
    responses(
        (status = 200, description = "Shipment notes listed", body = ApiResponse<PaginatedResponse<shipment_note::Model>>)
    ),
    tag = "shipment-notes"
)]
pub async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ShipmentNoteListQuery>,
) -> ApiResult<PaginatedResponse<shipment_note::Model>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(query.limit);

    let (items, total) = state
        .services
        .shipment_notes
        .list_notes(query.status, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipment-notes/:id",
    params(("id" = Uuid, Path, description = "Shipment note ID")),
    responses(
        (status = 200, description = "Shipment note fetched", body = ApiResponse<shipment_note::Model>),
        (status = 404, description = "Shipment note not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipment-notes"
)]
pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<shipment_note::Model> {
    let note = state.services.shipment_notes.get_note(id).await?;
    Ok(Json(ApiResponse::success(note)))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipment-notes/:id/return",
    params(("id" = Uuid, Path, description = "Shipment note ID")),
    responses(
        (status = 200, description = "Shipment note returned to sender", body = ApiResponse<shipment_note::Model>),
        (status = 409, description = "Note cannot be returned in its current status", body = crate::errors::ErrorResponse)
    ),
    tag = "shipment-notes"
)]
pub async fn return_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<shipment_note::Model> {
    let note = state.services.shipment_notes.return_to_sender(id).await?;
    Ok(Json(ApiResponse::success(note)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/:note_number",
    params(("note_number" = String, Path, description = "Shipment note number")),
    responses(
        (status = 200, description = "Tracking information", body = ApiResponse<ShipmentTracking>),
        (status = 404, description = "Unknown note number", body = crate::errors::ErrorResponse)
    ),
    tag = "tracking"
)]
pub async fn track_note(
    State(state): State<AppState>,
    Path(note_number): Path<String>,
) -> ApiResult<ShipmentTracking> {
    let tracking = state.services.shipment_notes.track(&note_number).await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    get,
    path = "/api/v1/eligible-notes/batch",
    params(BatchEligibilityQuery),
    responses(
        (status = 200, description = "PENDING notes on the route", body = ApiResponse<Vec<shipment_note::Model>>)
    ),
    tag = "shipment-notes"
)]
pub async fn eligible_for_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchEligibilityQuery>,
) -> ApiResult<Vec<shipment_note::Model>> {
    let notes = state
        .services
        .shipment_notes
        .eligible_for_batch(&query.origin, &query.destination)
        .await?;
    Ok(Json(ApiResponse::success(notes)))
}

#[utoipa::path(
    get,
    path = "/api/v1/eligible-notes/run",
    params(RunEligibilityQuery),
    responses(
        (status = 200, description = "MUAT or TRANSIT notes destined for the branch", body = ApiResponse<Vec<shipment_note::Model>>)
    ),
    tag = "shipment-notes"
)]
pub async fn eligible_for_run(
    State(state): State<AppState>,
    Query(query): Query<RunEligibilityQuery>,
) -> ApiResult<Vec<shipment_note::Model>> {
    let notes = state
        .services
        .shipment_notes
        .eligible_for_run(&query.branch)
        .await?;
    Ok(Json(ApiResponse::success(notes)))
}
