#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use freight_dispatch_api::{
    config::AppConfig,
    db,
    events::{self, EventHandler, EventSender, MetricsEventHandler},
    models::{shipment_note, vehicle_queue_entry, PaymentType, QueueKind},
    services::{shipment_notes::NewShipmentNote, vehicle_queue::RegisterVehicle},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        // every in-memory SQLite connection is its own database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(1024);
        let event_sender = EventSender::new(event_tx);
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(MetricsEventHandler)];
        let event_task = tokio::spawn(events::process_events(event_rx, handlers));

        let state = AppState::new(db_arc, cfg, event_sender);
        let router = freight_dispatch_api::build_router(state.clone())
            .expect("router builds with development CORS");

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Creates a `PENDING` note on the given route.
    pub async fn create_note(&self, origin: &str, destination: &str) -> shipment_note::Model {
        self.create_note_for(
            Uuid::new_v4(),
            origin,
            destination,
            Decimal::from(50_000),
            PaymentType::Cash,
        )
        .await
    }

    pub async fn create_note_for(
        &self,
        sender_id: Uuid,
        origin: &str,
        destination: &str,
        price: Decimal,
        payment_type: PaymentType,
    ) -> shipment_note::Model {
        self.state
            .services
            .shipment_notes
            .create_note(NewShipmentNote {
                pickup_request_id: None,
                origin_branch_id: origin.to_string(),
                destination_branch_id: destination.to_string(),
                sender_id,
                recipient_id: Uuid::new_v4(),
                cargo_description: "Boxed spare parts".to_string(),
                piece_count: 2,
                weight_kg: Decimal::from(12),
                price,
                payment_type,
            })
            .await
            .expect("seed shipment note")
    }

    /// Registers a vehicle at the tail of a branch queue.
    pub async fn register_vehicle(
        &self,
        branch: &str,
        vehicle_id: &str,
        kind: QueueKind,
    ) -> vehicle_queue_entry::Model {
        self.state
            .services
            .vehicle_queue
            .register(RegisterVehicle {
                branch_id: branch.to_string(),
                vehicle_id: vehicle_id.to_string(),
                queue_kind: kind,
                driver_id: Uuid::new_v4(),
                helper_id: None,
            })
            .await
            .expect("register vehicle")
    }

    /// Send a JSON request through the full router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
