use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::note_transitions::NoteTransition;
use super::normalize_branch;
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        loading_batch, loading_batch_item, shipment_note, shipment_note_event, BatchStatus,
        NoteEventKind, NoteStatus, PaymentType,
    },
};

/// Intake data for a new shipment note.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_route", skip_on_field_errors = false))]
#[schema(example = json!({
    "origin_branch_id": "JKT",
    "destination_branch_id": "SBY",
    "sender_id": "5f0e8400-e29b-41d4-a716-446655440000",
    "recipient_id": "6a0e8400-e29b-41d4-a716-446655440000",
    "cargo_description": "Spare parts",
    "piece_count": 3,
    "weight_kg": "12.5",
    "price": "150000",
    "payment_type": "CREDIT"
}))]
pub struct NewShipmentNote {
    /// Pickup request that produced this note, if any
    pub pickup_request_id: Option<Uuid>,
    #[validate(length(min = 1, max = 32), custom = "validate_not_blank")]
    pub origin_branch_id: String,
    #[validate(length(min = 1, max = 32), custom = "validate_not_blank")]
    pub destination_branch_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub cargo_description: String,
    #[validate(range(min = 1))]
    pub piece_count: i32,
    #[validate(custom = "validate_positive")]
    #[schema(value_type = String)]
    pub weight_kg: Decimal,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String)]
    pub price: Decimal,
    pub payment_type: PaymentType,
}

fn validate_route(note: &NewShipmentNote) -> Result<(), ValidationError> {
    if normalize_branch(&note.origin_branch_id) == normalize_branch(&note.destination_branch_id) {
        let mut err = ValidationError::new("same_branch");
        err.message = Some("destination branch must differ from origin branch".into());
        return Err(err);
    }
    Ok(())
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("must_not_be_blank"));
    }
    Ok(())
}

fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

/// Public tracking view of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShipmentTracking {
    pub note_number: String,
    pub status: NoteStatus,
    pub origin_branch_id: String,
    pub destination_branch_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub history: Vec<TrackingEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingEvent {
    pub kind: NoteEventKind,
    pub status: NoteStatus,
    pub branch_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl From<shipment_note_event::Model> for TrackingEvent {
    fn from(model: shipment_note_event::Model) -> Self {
        Self {
            kind: model.kind,
            status: model.status,
            branch_id: model.branch_id,
            occurred_at: model.occurred_at,
        }
    }
}

/// Where and why a transition happened, recorded on the note's history.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransitionContext {
    pub branch_id: Option<String>,
    pub reference_id: Option<Uuid>,
}

impl TransitionContext {
    pub fn at(branch_id: &str, reference_id: Uuid) -> Self {
        Self {
            branch_id: Some(branch_id.to_string()),
            reference_id: Some(reference_id),
        }
    }
}

/// An accepted status change, published once the transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StatusChange {
    pub note_id: Uuid,
    pub from: NoteStatus,
    pub to: NoteStatus,
    pub at: DateTime<Utc>,
}

impl From<StatusChange> for Event {
    fn from(change: StatusChange) -> Self {
        Event::NoteStatusChanged {
            note_id: change.note_id,
            from: change.from,
            to: change.to,
            at: change.at,
        }
    }
}

pub(crate) async fn find_note<C: ConnectionTrait>(
    conn: &C,
    note_id: Uuid,
) -> Result<shipment_note::Model, ServiceError> {
    shipment_note::Entity::find_by_id(note_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Shipment note {} not found", note_id)))
}

pub(crate) async fn load_note<C: ConnectionTrait>(
    conn: &C,
    note_id: Uuid,
) -> Result<Option<shipment_note::Model>, ServiceError> {
    Ok(shipment_note::Entity::find_by_id(note_id).one(conn).await?)
}

pub(crate) async fn record_event<C: ConnectionTrait>(
    conn: &C,
    note_id: Uuid,
    kind: NoteEventKind,
    status: NoteStatus,
    context: &TransitionContext,
    occurred_at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    shipment_note_event::ActiveModel {
        note_id: Set(note_id),
        kind: Set(kind),
        status: Set(status),
        branch_id: Set(context.branch_id.clone()),
        reference_id: Set(context.reference_id),
        occurred_at: Set(occurred_at),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Applies `transition` to `note` with a compare-and-set on its current
/// status, then appends the matching history event.
///
/// This is the only place a note's status is written after creation.
pub(crate) async fn advance_note<C: ConnectionTrait>(
    conn: &C,
    note: &shipment_note::Model,
    transition: NoteTransition,
    context: &TransitionContext,
) -> Result<StatusChange, ServiceError> {
    let from = note.status;
    let to = transition.apply(from).map_err(|e| {
        warn!(note_id = %note.id, %from, %transition, "Note transition rejected");
        counter!("freight.note.transition_rejected", 1, "transition" => transition.to_string());
        e
    })?;

    let now = Utc::now();
    let mut update = shipment_note::ActiveModel {
        status: Set(to),
        updated_at: Set(now),
        ..Default::default()
    };
    if to.is_terminal() {
        update.completed_at = Set(Some(now));
    }

    let result = shipment_note::Entity::update_many()
        .set(update)
        .filter(shipment_note::Column::Id.eq(note.id))
        .filter(shipment_note::Column::Status.eq(from))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        // someone else advanced the note first
        let current = find_note(conn, note.id).await?;
        warn!(note_id = %note.id, expected = %from, actual = %current.status, "Note status changed concurrently");
        counter!("freight.note.transition_rejected", 1, "transition" => transition.to_string());
        return Err(match transition.apply(current.status) {
            Err(e) => e,
            Ok(_) => ServiceError::InvalidTransition(format!(
                "note {} is no longer {}",
                note.note_number, from
            )),
        });
    }

    record_event(conn, note.id, transition.event_kind(), to, context, now).await?;

    info!(note_id = %note.id, note_number = %note.note_number, %from, %to, "Note status advanced");
    counter!("freight.note.transitions", 1, "transition" => transition.to_string());

    Ok(StatusChange {
        note_id: note.id,
        from,
        to,
        at: now,
    })
}

/// Removes a `MUAT` note from the open loading batch that holds it.
pub(crate) async fn detach_from_open_batch<C: ConnectionTrait>(
    conn: &C,
    note_id: Uuid,
) -> Result<Option<Uuid>, ServiceError> {
    let memberships = loading_batch_item::Entity::find()
        .filter(loading_batch_item::Column::NoteId.eq(note_id))
        .find_also_related(loading_batch::Entity)
        .all(conn)
        .await?;

    let mut detached_from = None;
    for (item, batch) in memberships {
        if batch.map(|b| b.status) == Some(BatchStatus::Open) {
            detached_from = Some(item.batch_id);
            item.delete(conn).await?;
        }
    }
    Ok(detached_from)
}

/// Shipment note intake, lookups and tracking.
#[derive(Clone)]
pub struct ShipmentNoteService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    note_number_prefix: String,
}

impl ShipmentNoteService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        note_number_prefix: impl Into<String>,
    ) -> Self {
        Self {
            db,
            event_sender,
            note_number_prefix: note_number_prefix.into(),
        }
    }

    fn next_note_number(&self, origin: &str, now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
        format!(
            "{}-{}-{}-{}",
            self.note_number_prefix,
            origin,
            now.format("%Y%m%d"),
            &suffix[..8]
        )
    }

    /// Creates a note in `PENDING` and records its `CREATED` event.
    #[instrument(skip(self, input), fields(origin = %input.origin_branch_id, destination = %input.destination_branch_id))]
    pub async fn create_note(
        &self,
        input: NewShipmentNote,
    ) -> Result<shipment_note::Model, ServiceError> {
        input.validate()?;

        let origin = normalize_branch(&input.origin_branch_id);
        let destination = normalize_branch(&input.destination_branch_id);
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let note = shipment_note::ActiveModel {
            id: Set(Uuid::new_v4()),
            note_number: Set(self.next_note_number(&origin, now)),
            pickup_request_id: Set(input.pickup_request_id),
            origin_branch_id: Set(origin.clone()),
            destination_branch_id: Set(destination),
            sender_id: Set(input.sender_id),
            recipient_id: Set(input.recipient_id),
            cargo_description: Set(input.cargo_description.trim().to_string()),
            piece_count: Set(input.piece_count),
            weight_kg: Set(input.weight_kg),
            price: Set(input.price),
            payment_type: Set(input.payment_type),
            status: Set(NoteStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        record_event(
            &txn,
            note.id,
            NoteEventKind::Created,
            NoteStatus::Pending,
            &TransitionContext {
                branch_id: Some(origin),
                reference_id: input.pickup_request_id,
            },
            now,
        )
        .await?;

        txn.commit().await?;

        info!(note_id = %note.id, note_number = %note.note_number, "Shipment note created");
        counter!("freight.note.created", 1);

        self.event_sender
            .send_or_log(Event::ShipmentNoteCreated {
                note_id: note.id,
                note_number: note.note_number.clone(),
            })
            .await;

        Ok(note)
    }

    #[instrument(skip(self))]
    pub async fn get_note(&self, note_id: Uuid) -> Result<shipment_note::Model, ServiceError> {
        find_note(&*self.db, note_id).await
    }

    /// Lists notes newest first; `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_notes(
        &self,
        status: Option<NoteStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<shipment_note::Model>, u64), ServiceError> {
        let mut query = shipment_note::Entity::find();
        if let Some(status) = status {
            query = query.filter(shipment_note::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(shipment_note::Column::CreatedAt)
            .order_by_desc(shipment_note::Column::Id)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let notes = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((notes, total))
    }

    /// Read-only status, route and history for a note number.
    #[instrument(skip(self))]
    pub async fn track(&self, note_number: &str) -> Result<ShipmentTracking, ServiceError> {
        let note = shipment_note::Entity::find()
            .filter(shipment_note::Column::NoteNumber.eq(note_number.trim()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment note {} not found", note_number))
            })?;

        let history = note
            .find_related(shipment_note_event::Entity)
            .order_by_asc(shipment_note_event::Column::Id)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(TrackingEvent::from)
            .collect();

        Ok(ShipmentTracking {
            note_number: note.note_number,
            status: note.status,
            origin_branch_id: note.origin_branch_id,
            destination_branch_id: note.destination_branch_id,
            created_at: note.created_at,
            completed_at: note.completed_at,
            history,
        })
    }

    /// `PENDING` notes on the given route, oldest first.
    #[instrument(skip(self))]
    pub async fn eligible_for_batch(
        &self,
        origin_branch_id: &str,
        destination_branch_id: &str,
    ) -> Result<Vec<shipment_note::Model>, ServiceError> {
        Ok(shipment_note::Entity::find()
            .filter(shipment_note::Column::OriginBranchId.eq(normalize_branch(origin_branch_id)))
            .filter(
                shipment_note::Column::DestinationBranchId
                    .eq(normalize_branch(destination_branch_id)),
            )
            .filter(shipment_note::Column::Status.eq(NoteStatus::Pending))
            .order_by_asc(shipment_note::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// `MUAT` or `TRANSIT` notes destined for the branch, oldest first.
    #[instrument(skip(self))]
    pub async fn eligible_for_run(
        &self,
        branch_id: &str,
    ) -> Result<Vec<shipment_note::Model>, ServiceError> {
        Ok(shipment_note::Entity::find()
            .filter(shipment_note::Column::DestinationBranchId.eq(normalize_branch(branch_id)))
            .filter(shipment_note::Column::Status.is_in(NoteStatus::RUN_ELIGIBLE))
            .order_by_asc(shipment_note::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Sends a loaded or in-transit note back to the sender. A `MUAT` note
    /// leaves its open loading batch in the same transaction.
    #[instrument(skip(self))]
    pub async fn return_to_sender(
        &self,
        note_id: Uuid,
    ) -> Result<shipment_note::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let note = find_note(&txn, note_id).await?;

        let batch_id = if note.status == NoteStatus::Muat {
            detach_from_open_batch(&txn, note.id).await?
        } else {
            None
        };

        let context = TransitionContext {
            branch_id: None,
            reference_id: batch_id,
        };
        let change = advance_note(&txn, &note, NoteTransition::ReturnToSender, &context).await?;
        let updated = find_note(&txn, note_id).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(change.into()).await;
        Ok(updated)
    }
}
