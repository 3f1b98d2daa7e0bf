use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{
    normalize_branch,
    note_transitions::NoteTransition,
    shipment_notes::{
        advance_note, find_note, load_note, record_event, StatusChange, TransitionContext,
    },
    vehicle_queue::{self, VehicleQueueService},
};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        loading_batch, loading_batch_item, shipment_note, vehicle_queue_entry, BatchStatus,
        EntityRef, NoteEventKind, NoteStatus, QueueKind,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_batch_route", skip_on_field_errors = false))]
pub struct OpenLoadingBatch {
    #[validate(length(min = 1, max = 32))]
    pub origin_branch_id: String,
    #[validate(length(min = 1, max = 32))]
    pub destination_branch_id: String,
    /// A `WAITING` entry from the origin branch's loading queue
    pub truck_entry_id: Uuid,
    pub checker_id: Uuid,
}

fn validate_batch_route(input: &OpenLoadingBatch) -> Result<(), ValidationError> {
    if normalize_branch(&input.origin_branch_id) == normalize_branch(&input.destination_branch_id)
    {
        let mut err = ValidationError::new("same_branch");
        err.message = Some("destination branch must differ from origin branch".into());
        return Err(err);
    }
    Ok(())
}

/// A batch with its truck and member notes, resolved or as ids.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoadingBatchView {
    pub batch: loading_batch::Model,
    #[schema(value_type = Object)]
    pub truck: EntityRef<vehicle_queue_entry::Model>,
    #[schema(value_type = Vec<Object>)]
    pub notes: Vec<EntityRef<shipment_note::Model>>,
}

async fn find_batch<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
) -> Result<loading_batch::Model, ServiceError> {
    loading_batch::Entity::find_by_id(batch_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Loading batch {} not found", batch_id)))
}

async fn member_items<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
) -> Result<Vec<loading_batch_item::Model>, ServiceError> {
    Ok(loading_batch_item::Entity::find()
        .filter(loading_batch_item::Column::BatchId.eq(batch_id))
        .order_by_asc(loading_batch_item::Column::Position)
        .all(conn)
        .await?)
}

/// Compare-and-set on the batch status, stamping the matching timestamp.
async fn set_batch_status<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
    from: BatchStatus,
    to: BatchStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let mut update = loading_batch::ActiveModel {
        status: Set(to),
        updated_at: Set(now),
        ..Default::default()
    };
    match to {
        BatchStatus::Departed => update.departed_at = Set(Some(now)),
        BatchStatus::Arrived => update.arrived_at = Set(Some(now)),
        BatchStatus::Open | BatchStatus::Cancelled => {}
    }

    let result = loading_batch::Entity::update_many()
        .set(update)
        .filter(loading_batch::Column::Id.eq(batch_id))
        .filter(loading_batch::Column::Status.eq(from))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let current = find_batch(conn, batch_id).await?;
        warn!(%batch_id, expected = %from, actual = %current.status, "Batch lifecycle step rejected");
        return Err(ServiceError::InvalidState(format!(
            "loading batch {} is {}, expected {}",
            batch_id, current.status, from
        )));
    }
    Ok(())
}

/// Inter-branch loading (Muat).
#[derive(Clone)]
pub struct LoadingBatchService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    queue: VehicleQueueService,
}

impl LoadingBatchService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        queue: VehicleQueueService,
    ) -> Self {
        Self {
            db,
            event_sender,
            queue,
        }
    }

    /// Opens an empty batch and claims its truck from the origin loading queue.
    #[instrument(skip(self, input), fields(origin = %input.origin_branch_id, destination = %input.destination_branch_id))]
    pub async fn open_batch(
        &self,
        input: OpenLoadingBatch,
    ) -> Result<loading_batch::Model, ServiceError> {
        input.validate()?;
        let origin = normalize_branch(&input.origin_branch_id);
        let destination = normalize_branch(&input.destination_branch_id);

        let _guard = self.queue.lock_branch(&origin).await;
        let txn = self.db.begin().await?;

        let truck =
            vehicle_queue::claim_entry(&txn, input.truck_entry_id, &origin, QueueKind::Loading)
                .await?;

        let now = Utc::now();
        let batch = loading_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            truck_entry_id: Set(truck.id),
            origin_branch_id: Set(origin),
            destination_branch_id: Set(destination),
            checker_id: Set(input.checker_id),
            status: Set(BatchStatus::Open),
            opened_at: Set(now),
            departed_at: Set(None),
            arrived_at: Set(None),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(batch_id = %batch.id, truck = %truck.vehicle_id, "Loading batch opened");
        self.event_sender
            .send_or_log(Event::VehicleClaimed {
                entry_id: truck.id,
                branch_id: truck.branch_id,
                vehicle_id: truck.vehicle_id,
            })
            .await;
        self.event_sender
            .send_or_log(Event::LoadingBatchOpened {
                batch_id: batch.id,
                origin_branch_id: batch.origin_branch_id.clone(),
                destination_branch_id: batch.destination_branch_id.clone(),
            })
            .await;
        Ok(batch)
    }

    /// Loads a `PENDING` note on the batch's route; the note becomes `MUAT`.
    #[instrument(skip(self))]
    pub async fn add_note(
        &self,
        batch_id: Uuid,
        note_id: Uuid,
    ) -> Result<shipment_note::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let batch = find_batch(&txn, batch_id).await?;
        // holds the batch row until commit so departure cannot interleave
        set_batch_status(&txn, batch_id, BatchStatus::Open, BatchStatus::Open, Utc::now()).await?;

        let note = find_note(&txn, note_id).await?;
        match note.status {
            status if status.is_terminal() => {
                return Err(ServiceError::AlreadyTerminal(format!(
                    "note {} is already {}",
                    note.note_number, status
                )));
            }
            NoteStatus::Muat => {
                return Err(ServiceError::AlreadyAssigned(format!(
                    "note {} is loaded in another open batch",
                    note.note_number
                )));
            }
            NoteStatus::Pending => {}
            other => {
                return Err(ServiceError::InvalidTransition(format!(
                    "note {} is {}, only PENDING notes can be loaded",
                    note.note_number, other
                )));
            }
        }
        if note.route() != (batch.origin_branch_id.as_str(), batch.destination_branch_id.as_str()) {
            counter!("freight.batch.route_mismatch", 1);
            return Err(ServiceError::RouteMismatch(format!(
                "note {} runs {} → {}, batch runs {} → {}",
                note.note_number,
                note.origin_branch_id,
                note.destination_branch_id,
                batch.origin_branch_id,
                batch.destination_branch_id
            )));
        }

        let context = TransitionContext::at(&batch.origin_branch_id, batch.id);
        let change = match advance_note(&txn, &note, NoteTransition::AssignToBatch, &context).await
        {
            Ok(change) => change,
            Err(ServiceError::InvalidTransition(_)) => {
                return Err(ServiceError::AlreadyAssigned(format!(
                    "note {} was loaded by another batch",
                    note.note_number
                )));
            }
            Err(e) => return Err(e),
        };

        let last_position: Option<i32> = loading_batch_item::Entity::find()
            .select_only()
            .column_as(loading_batch_item::Column::Position.max(), "last_position")
            .filter(loading_batch_item::Column::BatchId.eq(batch.id))
            .into_tuple()
            .one(&txn)
            .await?
            .flatten();
        let position = last_position.unwrap_or(0) + 1;
        loading_batch_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(batch.id),
            note_id: Set(note.id),
            position: Set(position),
            added_at: Set(change.at),
        }
        .insert(&txn)
        .await?;

        let updated = find_note(&txn, note.id).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(change.into()).await;
        Ok(updated)
    }

    /// `OPEN → DEPARTED`; every member note moves `MUAT → TRANSIT`.
    #[instrument(skip(self))]
    pub async fn depart(&self, batch_id: Uuid) -> Result<loading_batch::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let batch = find_batch(&txn, batch_id).await?;

        let items = member_items(&txn, batch_id).await?;
        if batch.status == BatchStatus::Open && items.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "loading batch {} has no notes to depart with",
                batch_id
            )));
        }
        set_batch_status(&txn, batch_id, BatchStatus::Open, BatchStatus::Departed, Utc::now())
            .await?;

        let context = TransitionContext::at(&batch.origin_branch_id, batch.id);
        let mut changes: Vec<StatusChange> = Vec::with_capacity(items.len());
        for item in &items {
            let note = find_note(&txn, item.note_id).await?;
            changes.push(advance_note(&txn, &note, NoteTransition::Depart, &context).await?);
        }

        let departed = find_batch(&txn, batch_id).await?;
        txn.commit().await?;

        info!(%batch_id, notes = changes.len(), "Loading batch departed");
        counter!("freight.batch.departed", 1);
        let note_count = changes.len();
        for change in changes {
            self.event_sender.send_or_log(change.into()).await;
        }
        self.event_sender
            .send_or_log(Event::LoadingBatchDeparted {
                batch_id,
                note_count,
            })
            .await;
        Ok(departed)
    }

    /// `DEPARTED → ARRIVED`; records arrival on every note still in transit
    /// and returns the truck to its queue as `RETURNED`.
    #[instrument(skip(self))]
    pub async fn arrive(&self, batch_id: Uuid) -> Result<loading_batch::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let batch = find_batch(&txn, batch_id).await?;
        let now = Utc::now();
        set_batch_status(&txn, batch_id, BatchStatus::Departed, BatchStatus::Arrived, now).await?;

        let context = TransitionContext::at(&batch.destination_branch_id, batch.id);
        for item in member_items(&txn, batch_id).await? {
            let note = find_note(&txn, item.note_id).await?;
            if note.status == NoteStatus::Transit {
                record_event(&txn, note.id, NoteEventKind::Arrived, note.status, &context, now)
                    .await?;
            }
        }

        vehicle_queue::release_entry(&txn, batch.truck_entry_id).await?;
        let arrived = find_batch(&txn, batch_id).await?;
        txn.commit().await?;

        info!(%batch_id, "Loading batch arrived");
        self.event_sender
            .send_or_log(Event::LoadingBatchArrived { batch_id })
            .await;
        self.event_sender
            .send_or_log(Event::VehicleReleased {
                entry_id: batch.truck_entry_id,
            })
            .await;
        Ok(arrived)
    }

    /// Cancels an empty open batch and frees its truck.
    #[instrument(skip(self))]
    pub async fn cancel(&self, batch_id: Uuid) -> Result<loading_batch::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let batch = find_batch(&txn, batch_id).await?;

        if !member_items(&txn, batch_id).await?.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "loading batch {} still holds notes",
                batch_id
            )));
        }
        set_batch_status(&txn, batch_id, BatchStatus::Open, BatchStatus::Cancelled, Utc::now())
            .await?;
        vehicle_queue::release_entry(&txn, batch.truck_entry_id).await?;

        let cancelled = find_batch(&txn, batch_id).await?;
        txn.commit().await?;

        info!(%batch_id, "Loading batch cancelled");
        self.event_sender
            .send_or_log(Event::LoadingBatchCancelled { batch_id })
            .await;
        Ok(cancelled)
    }

    #[instrument(skip(self))]
    pub async fn get_batch(
        &self,
        batch_id: Uuid,
        expand: bool,
    ) -> Result<LoadingBatchView, ServiceError> {
        let db = &*self.db;
        let batch = find_batch(db, batch_id).await?;
        let items = member_items(db, batch_id).await?;

        let truck =
            EntityRef::resolve(batch.truck_entry_id, expand, |id| vehicle_queue::load_entry(db, id))
                .await?;
        let mut notes = Vec::with_capacity(items.len());
        for item in &items {
            notes.push(EntityRef::resolve(item.note_id, expand, |id| load_note(db, id)).await?);
        }

        Ok(LoadingBatchView {
            batch,
            truck,
            notes,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        origin_branch_id: Option<&str>,
        status: Option<BatchStatus>,
    ) -> Result<Vec<loading_batch::Model>, ServiceError> {
        let mut query = loading_batch::Entity::find();
        if let Some(origin) = origin_branch_id {
            query = query.filter(loading_batch::Column::OriginBranchId.eq(normalize_branch(origin)));
        }
        if let Some(status) = status {
            query = query.filter(loading_batch::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(loading_batch::Column::OpenedAt)
            .all(&*self.db)
            .await?)
    }
}
