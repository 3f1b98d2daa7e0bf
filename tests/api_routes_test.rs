//! HTTP surface tests: status codes, envelopes and error codes through the
//! full router.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{response_json, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

fn note_body(origin: &str, destination: &str) -> Value {
    json!({
        "origin_branch_id": origin,
        "destination_branch_id": destination,
        "sender_id": Uuid::new_v4(),
        "recipient_id": Uuid::new_v4(),
        "cargo_description": "Ceramic tiles",
        "piece_count": 4,
        "weight_kg": "40",
        "price": "120000",
        "payment_type": "CASH"
    })
}

async fn post_json(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app.request(Method::POST, uri, Some(body)).await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn post_empty(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let response = app.request(Method::POST, uri, None).await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let response = app.request(Method::GET, uri, None).await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn open_batch_over_http(app: &TestApp, truck: &str) -> String {
    let (status, entry) = post_json(
        app,
        "/api/v1/vehicle-queue",
        json!({
            "branch_id": "JKT",
            "vehicle_id": truck,
            "queue_kind": "LOADING",
            "driver_id": Uuid::new_v4()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, batch) = post_json(
        app,
        "/api/v1/loading-batches",
        json!({
            "origin_branch_id": "JKT",
            "destination_branch_id": "SBY",
            "truck_entry_id": entry["data"]["id"],
            "checker_id": Uuid::new_v4()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    batch["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_note_returns_created_with_envelope_and_request_id() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/shipment-notes",
            Some(note_body("JKT", "SBY")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("x-request-id"));

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["origin_branch_id"], "JKT");
    assert!(body["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn invalid_intake_and_unknown_ids_map_to_error_codes() {
    let app = TestApp::new().await;

    let (status, body) = post_json(&app, "/api/v1/shipment-notes", note_body("JKT", "jkt")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = get_json(
        &app,
        &format!("/api/v1/shipment-notes/{}", Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn workflow_rejections_carry_distinct_codes() {
    let app = TestApp::new().await;

    let (_, note) = post_json(&app, "/api/v1/shipment-notes", note_body("JKT", "SBY")).await;
    let note_id = note["data"]["id"].clone();
    let (_, stray) = post_json(&app, "/api/v1/shipment-notes", note_body("JKT", "MDN")).await;

    let first = open_batch_over_http(&app, "B 1001 AA").await;
    let second = open_batch_over_http(&app, "B 1002 BB").await;

    let (status, loaded) = post_json(
        &app,
        &format!("/api/v1/loading-batches/{}/notes", first),
        json!({ "note_id": note_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["data"]["status"], "MUAT");

    let (status, body) = post_json(
        &app,
        &format!("/api/v1/loading-batches/{}/notes", second),
        json!({ "note_id": note_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_assigned");

    let (status, body) = post_json(
        &app,
        &format!("/api/v1/loading-batches/{}/notes", second),
        json!({ "note_id": stray["data"]["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "route_mismatch");

    let (status, body) = post_json(
        &app,
        "/api/v1/delivery-runs",
        json!({
            "branch_id": "SBY",
            "checker_id": Uuid::new_v4(),
            "admin_id": Uuid::new_v4(),
            "recipient_name": "Front desk",
            "start_odometer": 10
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "no_vehicle_available");
}

#[tokio::test]
async fn batch_view_expands_references_on_request() {
    let app = TestApp::new().await;

    let (_, note) = post_json(&app, "/api/v1/shipment-notes", note_body("JKT", "SBY")).await;
    let batch = open_batch_over_http(&app, "B 2001 AA").await;
    post_json(
        &app,
        &format!("/api/v1/loading-batches/{}/notes", batch),
        json!({ "note_id": note["data"]["id"] }),
    )
    .await;

    let (status, plain) = get_json(&app, &format!("/api/v1/loading-batches/{}", batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plain["data"]["notes"][0], note["data"]["id"]);

    let (_, expanded) =
        get_json(&app, &format!("/api/v1/loading-batches/{}?expand=true", batch)).await;
    assert_eq!(expanded["data"]["notes"][0]["status"], "MUAT");
    assert_eq!(expanded["data"]["truck"]["vehicle_id"], "B 2001 AA");

    let (status, departed) =
        post_empty(&app, &format!("/api/v1/loading-batches/{}/depart", batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(departed["data"]["status"], "DEPARTED");
}

#[tokio::test]
async fn tracking_and_listing_endpoints() {
    let app = TestApp::new().await;

    let (_, note) = post_json(&app, "/api/v1/shipment-notes", note_body("JKT", "SBY")).await;
    post_json(&app, "/api/v1/shipment-notes", note_body("JKT", "BDG")).await;

    let number = note["data"]["note_number"].as_str().unwrap();
    let (status, tracking) = get_json(&app, &format!("/api/v1/tracking/{}", number)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracking["data"]["status"], "PENDING");
    assert_eq!(tracking["data"]["history"][0]["kind"], "CREATED");

    let (status, page) = get_json(&app, "/api/v1/shipment-notes?limit=1&page=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 2);
    assert_eq!(page["data"]["total_pages"], 2);
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 1);

    let (status, eligible) =
        get_json(&app, "/api/v1/eligible-notes/batch?origin=JKT&destination=SBY").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(eligible["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn vehicle_queue_endpoints() {
    let app = TestApp::new().await;

    let (status, entry) = post_json(
        &app,
        "/api/v1/vehicle-queue",
        json!({
            "branch_id": "SBY",
            "vehicle_id": "L 3001 ZZ",
            "queue_kind": "DELIVERY",
            "driver_id": Uuid::new_v4()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["data"]["status"], "WAITING");
    let id = entry["data"]["id"].as_str().unwrap().to_string();

    let (status, queue) = get_json(&app, "/api/v1/vehicle-queue?branch=SBY&kind=DELIVERY").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["data"].as_array().unwrap().len(), 1);

    let (status, body) = post_empty(&app, &format!("/api/v1/vehicle-queue/{}/requeue", id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state");

    let response = app
        .request(Method::DELETE, &format!("/api/v1/vehicle-queue/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = get_json(&app, &format!("/api/v1/vehicle-queue/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoicing_feed_and_service_endpoints() {
    let app = TestApp::new().await;
    let today = Utc::now().date_naive();

    let (status, feed) = get_json(
        &app,
        &format!(
            "/api/v1/invoicing/notes?customer_id={}&from={}&to={}",
            Uuid::new_v4(),
            today,
            today
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed["data"]["notes"].as_array().unwrap().is_empty());

    let (status, health) = get_json(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["data"]["checks"]["database"], "healthy");

    let (status, doc) = get_json(&app, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/delivery-runs"].is_object());
}
