use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{DeliveryOutcome, NoteStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event for an operation that has already committed. A closed
    /// channel is logged and otherwise ignored.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Event delivery failed after commit");
            counter!("freight.events.dropped", 1);
        }
    }
}

/// Workflow events emitted after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ShipmentNoteCreated {
        note_id: Uuid,
        note_number: String,
    },
    NoteStatusChanged {
        note_id: Uuid,
        from: NoteStatus,
        to: NoteStatus,
        at: DateTime<Utc>,
    },
    LoadingBatchOpened {
        batch_id: Uuid,
        origin_branch_id: String,
        destination_branch_id: String,
    },
    LoadingBatchDeparted {
        batch_id: Uuid,
        note_count: usize,
    },
    LoadingBatchArrived {
        batch_id: Uuid,
    },
    LoadingBatchCancelled {
        batch_id: Uuid,
    },
    DeliveryRunOpened {
        run_id: Uuid,
        branch_id: String,
        vehicle_entry_id: Uuid,
    },
    DeliveryRunDispatched {
        run_id: Uuid,
        note_count: usize,
    },
    DeliveryRunCompleted {
        run_id: Uuid,
        outcomes: Vec<(Uuid, DeliveryOutcome)>,
    },
    DeliveryRunCancelled {
        run_id: Uuid,
    },
    VehicleClaimed {
        entry_id: Uuid,
        branch_id: String,
        vehicle_id: String,
    },
    VehicleReleased {
        entry_id: Uuid,
    },
    VehicleRequeued {
        entry_id: Uuid,
        urutan: i64,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ShipmentNoteCreated { .. } => "shipment_note_created",
            Event::NoteStatusChanged { .. } => "note_status_changed",
            Event::LoadingBatchOpened { .. } => "loading_batch_opened",
            Event::LoadingBatchDeparted { .. } => "loading_batch_departed",
            Event::LoadingBatchArrived { .. } => "loading_batch_arrived",
            Event::LoadingBatchCancelled { .. } => "loading_batch_cancelled",
            Event::DeliveryRunOpened { .. } => "delivery_run_opened",
            Event::DeliveryRunDispatched { .. } => "delivery_run_dispatched",
            Event::DeliveryRunCompleted { .. } => "delivery_run_completed",
            Event::DeliveryRunCancelled { .. } => "delivery_run_cancelled",
            Event::VehicleClaimed { .. } => "vehicle_claimed",
            Event::VehicleReleased { .. } => "vehicle_released",
            Event::VehicleRequeued { .. } => "vehicle_requeued",
        }
    }
}

// Handlers implementing this trait process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Counts processed events by name.
pub struct MetricsEventHandler;

#[async_trait]
impl EventHandler for MetricsEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        counter!("freight.events.processed", 1, "event" => event.name());
        Ok(())
    }
}

/// Drains the channel, logging each event and fanning it out to the handlers.
/// Returns once every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::NoteStatusChanged { note_id, from, to, .. } => {
                info!(%note_id, %from, %to, "Shipment note status changed");
            }
            Event::DeliveryRunCompleted { run_id, outcomes } => {
                let delivered = outcomes
                    .iter()
                    .filter(|(_, o)| *o == DeliveryOutcome::Delivered)
                    .count();
                info!(
                    %run_id,
                    delivered,
                    returned = outcomes.len() - delivered,
                    "Delivery run completed"
                );
            }
            other => debug!(event = other.name(), "Received event: {:?}", other),
        }

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.name(), error = %e, "Event handler failed");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.0.lock().await.push(event.name());
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_every_handler_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let recorder = Arc::new(Recorder::default());

        sender
            .send(Event::LoadingBatchArrived {
                batch_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        sender
            .send(Event::VehicleReleased {
                entry_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        drop(sender);

        process_events(rx, vec![recorder.clone(), Arc::new(MetricsEventHandler)]).await;

        assert_eq!(
            *recorder.0.lock().await,
            vec!["loading_batch_arrived", "vehicle_released"]
        );
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender
            .send_or_log(Event::DeliveryRunCancelled {
                run_id: Uuid::new_v4(),
            })
            .await;
        assert!(sender
            .send(Event::LoadingBatchCancelled {
                batch_id: Uuid::new_v4()
            })
            .await
            .is_err());
    }
}
