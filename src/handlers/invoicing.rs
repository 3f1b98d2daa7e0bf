use crate::{
    services::invoicing::{InvoiceFeed, InvoicePeriod},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
};

#[utoipa::path(
    get,
    path = "/api/v1/invoicing/notes",
    params(InvoicePeriod),
    responses(
        (status = 200, description = "Terminal notes billable to the customer", body = ApiResponse<InvoiceFeed>),
        (status = 400, description = "Invalid period", body = crate::errors::ErrorResponse)
    ),
    tag = "invoicing"
)]
pub async fn notes_for_invoice(
    State(state): State<AppState>,
    Query(period): Query<InvoicePeriod>,
) -> ApiResult<InvoiceFeed> {
    let feed = state.services.invoicing.notes_for_invoice(period).await?;
    Ok(Json(ApiResponse::success(feed)))
}
