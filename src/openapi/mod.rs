use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Freight Dispatch API",
        version = "1.0.0",
        description = r#"
# Freight Dispatch API

Shipment-note (STT) lifecycle and vehicle-queue orchestration for inter-branch freight.

## Workflow

- **Intake**: a shipment note is created in `PENDING` at its origin branch
- **Loading (Muat)**: PENDING notes on one route are loaded into a batch on the next waiting truck
- **Transit**: departing a batch moves every loaded note to `TRANSIT`
- **Delivery (Lansir)**: notes destined for a branch are assigned to a delivery run on the next waiting vehicle
- **Completion**: every note on a run ends in `TERKIRIM` or `RETURN`, and the vehicle is released

## Error Handling

Workflow rejections carry a machine-readable `code`:

```json
{
  "error": "Conflict",
  "code": "already_assigned",
  "message": "Already assigned: note is loaded in another open batch",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

`GET /shipment-notes` accepts `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "shipment-notes", description = "Shipment note intake and lookup"),
        (name = "tracking", description = "Public tracking by note number"),
        (name = "vehicle-queue", description = "Per-branch FIFO vehicle queues"),
        (name = "loading-batches", description = "Origin loading (Muat)"),
        (name = "delivery-runs", description = "Last-mile delivery (Lansir)"),
        (name = "invoicing", description = "Billing feed of completed notes")
    ),
    paths(
        crate::handlers::shipment_notes::create_note,
        crate::handlers::shipment_notes::list_notes,
        crate::handlers::shipment_notes::get_note,
        crate::handlers::shipment_notes::return_note,
        crate::handlers::shipment_notes::track_note,
        crate::handlers::shipment_notes::eligible_for_batch,
        crate::handlers::shipment_notes::eligible_for_run,

        crate::handlers::vehicle_queue::list_queue,
        crate::handlers::vehicle_queue::register_vehicle,
        crate::handlers::vehicle_queue::get_entry,
        crate::handlers::vehicle_queue::requeue_vehicle,
        crate::handlers::vehicle_queue::decommission_vehicle,

        crate::handlers::loading_batches::open_batch,
        crate::handlers::loading_batches::list_batches,
        crate::handlers::loading_batches::get_batch,
        crate::handlers::loading_batches::add_note,
        crate::handlers::loading_batches::depart_batch,
        crate::handlers::loading_batches::arrive_batch,
        crate::handlers::loading_batches::cancel_batch,

        crate::handlers::delivery_runs::open_run,
        crate::handlers::delivery_runs::list_runs,
        crate::handlers::delivery_runs::get_run,
        crate::handlers::delivery_runs::add_note,
        crate::handlers::delivery_runs::dispatch_run,
        crate::handlers::delivery_runs::complete_run,
        crate::handlers::delivery_runs::cancel_run,

        crate::handlers::invoicing::notes_for_invoice,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::errors::ErrorResponse,

            crate::models::NoteStatus,
            crate::models::PaymentType,
            crate::models::NoteEventKind,
            crate::models::QueueKind,
            crate::models::QueueStatus,
            crate::models::BatchStatus,
            crate::models::RunStatus,
            crate::models::DeliveryOutcome,

            crate::services::shipment_notes::NewShipmentNote,
            crate::services::shipment_notes::ShipmentTracking,
            crate::services::shipment_notes::TrackingEvent,
            crate::services::vehicle_queue::RegisterVehicle,
            crate::services::loading_batches::OpenLoadingBatch,
            crate::services::loading_batches::LoadingBatchView,
            crate::services::delivery_runs::OpenDeliveryRun,
            crate::services::delivery_runs::NoteOutcome,
            crate::services::delivery_runs::CompleteDeliveryRun,
            crate::services::delivery_runs::DeliveryRunView,
            crate::services::delivery_runs::RunItemView,
            crate::services::invoicing::InvoiceFeed,
            crate::handlers::loading_batches::AddNoteRequest,
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
