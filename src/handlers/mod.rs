pub mod delivery_runs;
pub mod invoicing;
pub mod loading_batches;
pub mod shipment_notes;
pub mod vehicle_queue;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    delivery_runs::DeliveryRunService, invoicing::InvoicingService,
    loading_batches::LoadingBatchService, shipment_notes::ShipmentNoteService,
    vehicle_queue::VehicleQueueService,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub shipment_notes: Arc<ShipmentNoteService>,
    pub vehicle_queue: Arc<VehicleQueueService>,
    pub loading_batches: Arc<LoadingBatchService>,
    pub delivery_runs: Arc<DeliveryRunService>,
    pub invoicing: Arc<InvoicingService>,
}

impl AppServices {
    /// Builds every service over one pool. Loading batches and delivery runs
    /// share the queue service so branch locks are common to all claims.
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        let vehicle_queue = VehicleQueueService::new(db_pool.clone(), event_sender.clone());

        let shipment_notes = Arc::new(ShipmentNoteService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.note_number_prefix.clone(),
        ));
        let loading_batches = Arc::new(LoadingBatchService::new(
            db_pool.clone(),
            event_sender.clone(),
            vehicle_queue.clone(),
        ));
        let delivery_runs = Arc::new(DeliveryRunService::new(
            db_pool.clone(),
            event_sender,
            vehicle_queue.clone(),
        ));
        let invoicing = Arc::new(InvoicingService::new(db_pool));

        Self {
            shipment_notes,
            vehicle_queue: Arc::new(vehicle_queue),
            loading_batches,
            delivery_runs,
            invoicing,
        }
    }
}

/// `?expand=true` resolves references into full records.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpandQuery {
    #[serde(default)]
    pub expand: bool,
}
