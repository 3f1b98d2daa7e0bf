use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{
    normalize_branch,
    note_transitions::NoteTransition,
    shipment_notes::{
        advance_note, detach_from_open_batch, find_note, load_note, StatusChange,
        TransitionContext,
    },
    vehicle_queue::{self, VehicleQueueService},
};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        delivery_run, delivery_run_item, shipment_note, vehicle_queue_entry, DeliveryOutcome,
        EntityRef, NoteStatus, QueueKind, RunStatus,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OpenDeliveryRun {
    #[validate(length(min = 1, max = 32))]
    pub branch_id: String,
    pub checker_id: Uuid,
    pub admin_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub recipient_name: String,
    #[validate(range(min = 0))]
    pub start_odometer: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteOutcome {
    pub note_id: Uuid,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompleteDeliveryRun {
    /// One outcome per member note
    #[validate(length(min = 1))]
    pub outcomes: Vec<NoteOutcome>,
    #[validate(range(min = 0))]
    pub end_odometer: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunItemView {
    pub position: i32,
    #[schema(value_type = Object)]
    pub note: EntityRef<shipment_note::Model>,
    pub outcome: Option<DeliveryOutcome>,
}

/// A run with its vehicle and member notes, resolved or as ids.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryRunView {
    pub run: delivery_run::Model,
    #[schema(value_type = Object)]
    pub vehicle: EntityRef<vehicle_queue_entry::Model>,
    pub items: Vec<RunItemView>,
}

async fn find_run<C: ConnectionTrait>(
    conn: &C,
    run_id: Uuid,
) -> Result<delivery_run::Model, ServiceError> {
    delivery_run::Entity::find_by_id(run_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Delivery run {} not found", run_id)))
}

async fn member_items<C: ConnectionTrait>(
    conn: &C,
    run_id: Uuid,
) -> Result<Vec<delivery_run_item::Model>, ServiceError> {
    Ok(delivery_run_item::Entity::find()
        .filter(delivery_run_item::Column::RunId.eq(run_id))
        .order_by_asc(delivery_run_item::Column::Position)
        .all(conn)
        .await?)
}

async fn set_run_status<C: ConnectionTrait>(
    conn: &C,
    run_id: Uuid,
    from: RunStatus,
    mut update: delivery_run::ActiveModel,
) -> Result<(), ServiceError> {
    update.updated_at = Set(Utc::now());
    let result = delivery_run::Entity::update_many()
        .set(update)
        .filter(delivery_run::Column::Id.eq(run_id))
        .filter(delivery_run::Column::Status.eq(from))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let current = find_run(conn, run_id).await?;
        warn!(%run_id, expected = %from, actual = %current.status, "Run lifecycle step rejected");
        return Err(ServiceError::InvalidState(format!(
            "delivery run {} is {}, expected {}",
            run_id, current.status, from
        )));
    }
    Ok(())
}

fn status_update(to: RunStatus) -> delivery_run::ActiveModel {
    delivery_run::ActiveModel {
        status: Set(to),
        ..Default::default()
    }
}

/// Checks the outcome list names every member exactly once.
fn outcomes_by_note(
    members: &[delivery_run_item::Model],
    outcomes: &[NoteOutcome],
) -> Result<HashMap<Uuid, DeliveryOutcome>, ServiceError> {
    let mut by_note = HashMap::with_capacity(outcomes.len());
    for entry in outcomes {
        if by_note.insert(entry.note_id, entry.outcome).is_some() {
            return Err(ServiceError::ValidationError(format!(
                "duplicate outcome for note {}",
                entry.note_id
            )));
        }
    }

    let member_ids: HashSet<Uuid> = members.iter().map(|item| item.note_id).collect();
    if let Some(stranger) = by_note.keys().find(|id| !member_ids.contains(id)) {
        return Err(ServiceError::ValidationError(format!(
            "note {} is not part of this run",
            stranger
        )));
    }
    if let Some(missing) = members.iter().find(|item| !by_note.contains_key(&item.note_id)) {
        return Err(ServiceError::ValidationError(format!(
            "missing outcome for note {}",
            missing.note_id
        )));
    }
    Ok(by_note)
}

/// Last-mile delivery (Lansir).
#[derive(Clone)]
pub struct DeliveryRunService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    queue: VehicleQueueService,
}

impl DeliveryRunService {
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

    /// Claims the next waiting delivery vehicle at the branch and opens an
    /// empty run on it. Nothing is created when no vehicle is waiting.
    #[instrument(skip(self, input), fields(branch = %input.branch_id))]
    pub async fn open_run(
        &self,
        input: OpenDeliveryRun,
    ) -> Result<delivery_run::Model, ServiceError> {
        input.validate()?;
        let branch_id = normalize_branch(&input.branch_id);

        let _guard = self.queue.lock_branch(&branch_id).await;
        let txn = self.db.begin().await?;

        let vehicle = vehicle_queue::claim_next(&txn, &branch_id, QueueKind::Delivery).await?;

        let now = Utc::now();
        let run = delivery_run::ActiveModel {
            id: Set(Uuid::new_v4()),
            vehicle_entry_id: Set(vehicle.id),
            branch_id: Set(branch_id),
            checker_id: Set(input.checker_id),
            admin_id: Set(input.admin_id),
            recipient_name: Set(input.recipient_name.trim().to_string()),
            start_odometer: Set(input.start_odometer),
            end_odometer: Set(None),
            status: Set(RunStatus::Open),
            opened_at: Set(now),
            dispatched_at: Set(None),
            completed_at: Set(None),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(run_id = %run.id, vehicle = %vehicle.vehicle_id, "Delivery run opened");
        self.event_sender
            .send_or_log(Event::VehicleClaimed {
                entry_id: vehicle.id,
                branch_id: vehicle.branch_id,
                vehicle_id: vehicle.vehicle_id,
            })
            .await;
        self.event_sender
            .send_or_log(Event::DeliveryRunOpened {
                run_id: run.id,
                branch_id: run.branch_id.clone(),
                vehicle_entry_id: run.vehicle_entry_id,
            })
            .await;
        Ok(run)
    }

    /// Puts a `MUAT` or `TRANSIT` note destined for the run's branch on the
    /// run; the note becomes `LANSIR`. A `MUAT` note leaves its loading batch.
    #[instrument(skip(self))]
    pub async fn add_note(
        &self,
        run_id: Uuid,
        note_id: Uuid,
    ) -> Result<shipment_note::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let run = find_run(&txn, run_id).await?;
        set_run_status(&txn, run_id, RunStatus::Open, status_update(RunStatus::Open)).await?;

        let note = find_note(&txn, note_id).await?;
        match note.status {
            status if status.is_terminal() => {
                return Err(ServiceError::AlreadyTerminal(format!(
                    "note {} is already {}",
                    note.note_number, status
                )));
            }
            NoteStatus::Lansir => {
                return Err(ServiceError::AlreadyAssigned(format!(
                    "note {} is already out on another delivery run",
                    note.note_number
                )));
            }
            NoteStatus::Muat | NoteStatus::Transit => {}
            other => {
                return Err(ServiceError::NotEligible(format!(
                    "note {} is {}, only MUAT or TRANSIT notes can go out for delivery",
                    note.note_number, other
                )));
            }
        }
        if note.destination_branch_id != run.branch_id {
            return Err(ServiceError::NotEligible(format!(
                "note {} is destined for {}, run delivers from {}",
                note.note_number, note.destination_branch_id, run.branch_id
            )));
        }

        if note.status == NoteStatus::Muat {
            detach_from_open_batch(&txn, note.id).await?;
        }

        let context = TransitionContext::at(&run.branch_id, run.id);
        let change = match advance_note(&txn, &note, NoteTransition::AssignToRun, &context).await {
            Ok(change) => change,
            Err(ServiceError::InvalidTransition(_)) => {
                return Err(ServiceError::AlreadyAssigned(format!(
                    "note {} was taken by another delivery run",
                    note.note_number
                )));
            }
            Err(e) => return Err(e),
        };

        let last_position: Option<i32> = delivery_run_item::Entity::find()
            .select_only()
            .column_as(delivery_run_item::Column::Position.max(), "last_position")
            .filter(delivery_run_item::Column::RunId.eq(run.id))
            .into_tuple()
            .one(&txn)
            .await?
            .flatten();
        let position = last_position.unwrap_or(0) + 1;
        delivery_run_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            run_id: Set(run.id),
            note_id: Set(note.id),
            position: Set(position),
            outcome: Set(None),
            added_at: Set(change.at),
        }
        .insert(&txn)
        .await?;

        let updated = find_note(&txn, note.id).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(change.into()).await;
        Ok(updated)
    }

    /// `OPEN → DISPATCHED`.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, run_id: Uuid) -> Result<delivery_run::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let run = find_run(&txn, run_id).await?;

        let items = member_items(&txn, run_id).await?;
        if run.status == RunStatus::Open && items.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "delivery run {} has no notes to deliver",
                run_id
            )));
        }

        let mut update = status_update(RunStatus::Dispatched);
        update.dispatched_at = Set(Some(Utc::now()));
        set_run_status(&txn, run_id, RunStatus::Open, update).await?;

        let dispatched = find_run(&txn, run_id).await?;
        txn.commit().await?;

        info!(%run_id, notes = items.len(), "Delivery run dispatched");
        self.event_sender
            .send_or_log(Event::DeliveryRunDispatched {
                run_id,
                note_count: items.len(),
            })
            .await;
        Ok(dispatched)
    }

    /// Applies each member's outcome (`TERKIRIM` or `RETURN`) and returns the
    /// vehicle to its queue as `RETURNED`. Mixed outcomes are allowed.
    #[instrument(skip(self, input))]
    pub async fn complete(
        &self,
        run_id: Uuid,
        input: CompleteDeliveryRun,
    ) -> Result<delivery_run::Model, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;
        let run = find_run(&txn, run_id).await?;

        let items = member_items(&txn, run_id).await?;
        if run.status != RunStatus::Dispatched {
            return Err(ServiceError::InvalidState(format!(
                "delivery run {} is {}, expected DISPATCHED",
                run_id, run.status
            )));
        }
        let outcomes = outcomes_by_note(&items, &input.outcomes)?;
        if let Some(end) = input.end_odometer {
            if end < run.start_odometer {
                return Err(ServiceError::ValidationError(format!(
                    "end odometer {} is below start odometer {}",
                    end, run.start_odometer
                )));
            }
        }

        let now: DateTime<Utc> = Utc::now();
        let mut update = status_update(RunStatus::Completed);
        update.completed_at = Set(Some(now));
        update.end_odometer = Set(input.end_odometer);
        set_run_status(&txn, run_id, RunStatus::Dispatched, update).await?;

        let context = TransitionContext::at(&run.branch_id, run.id);
        let mut changes: Vec<StatusChange> = Vec::with_capacity(items.len());
        let mut applied = Vec::with_capacity(items.len());
        for item in items {
            let outcome = outcomes
                .get(&item.note_id)
                .copied()
                .ok_or_else(|| ServiceError::InternalError("outcome vanished".into()))?;
            let transition = match outcome {
                DeliveryOutcome::Delivered => NoteTransition::Deliver,
                DeliveryOutcome::Failed => NoteTransition::Fail,
            };

            let note = find_note(&txn, item.note_id).await?;
            changes.push(advance_note(&txn, &note, transition, &context).await?);

            let note_id = item.note_id;
            let mut item: delivery_run_item::ActiveModel = item.into();
            item.outcome = Set(Some(outcome));
            item.update(&txn).await?;
            applied.push((note_id, outcome));
        }

        vehicle_queue::release_entry(&txn, run.vehicle_entry_id).await?;
        let completed = find_run(&txn, run_id).await?;
        txn.commit().await?;

        let delivered = applied
            .iter()
            .filter(|(_, outcome)| *outcome == DeliveryOutcome::Delivered)
            .count();
        info!(%run_id, delivered, returned = applied.len() - delivered, "Delivery run completed");
        counter!("freight.run.completed", 1);

        for change in changes {
            self.event_sender.send_or_log(change.into()).await;
        }
        self.event_sender
            .send_or_log(Event::VehicleReleased {
                entry_id: run.vehicle_entry_id,
            })
            .await;
        self.event_sender
            .send_or_log(Event::DeliveryRunCompleted {
                run_id,
                outcomes: applied,
            })
            .await;
        Ok(completed)
    }

    /// Cancels an empty open run and frees its vehicle.
    #[instrument(skip(self))]
    pub async fn cancel(&self, run_id: Uuid) -> Result<delivery_run::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let run = find_run(&txn, run_id).await?;

        if !member_items(&txn, run_id).await?.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "delivery run {} still holds notes",
                run_id
            )));
        }
        set_run_status(&txn, run_id, RunStatus::Open, status_update(RunStatus::Cancelled)).await?;
        vehicle_queue::release_entry(&txn, run.vehicle_entry_id).await?;

        let cancelled = find_run(&txn, run_id).await?;
        txn.commit().await?;

        info!(%run_id, "Delivery run cancelled");
        self.event_sender
            .send_or_log(Event::DeliveryRunCancelled { run_id })
            .await;
        Ok(cancelled)
    }

    #[instrument(skip(self))]
    pub async fn get_run(&self, run_id: Uuid, expand: bool) -> Result<DeliveryRunView, ServiceError> {
        let db = &*self.db;
        let run = find_run(db, run_id).await?;

        let vehicle =
            EntityRef::resolve(run.vehicle_entry_id, expand, |id| vehicle_queue::load_entry(db, id))
                .await?;

        let mut items = Vec::new();
        for item in member_items(db, run_id).await? {
            let note = EntityRef::resolve(item.note_id, expand, |id| load_note(db, id)).await?;
            items.push(RunItemView {
                position: item.position,
                note,
                outcome: item.outcome,
            });
        }

        Ok(DeliveryRunView {
            run,
            vehicle,
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_runs(
        &self,
        branch_id: Option<&str>,
        status: Option<RunStatus>,
    ) -> Result<Vec<delivery_run::Model>, ServiceError> {
        let mut query = delivery_run::Entity::find();
        if let Some(branch) = branch_id {
            query = query.filter(delivery_run::Column::BranchId.eq(normalize_branch(branch)));
        }
        if let Some(status) = status {
            query = query.filter(delivery_run::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(delivery_run::Column::OpenedAt)
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(note_id: Uuid) -> delivery_run_item::Model {
        delivery_run_item::Model {
            id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            note_id,
            position: 1,
            outcome: None,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn outcomes_must_cover_members_exactly() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let members = vec![item(a), item(b)];

        let full = vec![
            NoteOutcome { note_id: a, outcome: DeliveryOutcome::Delivered },
            NoteOutcome { note_id: b, outcome: DeliveryOutcome::Failed },
        ];
        let mapped = outcomes_by_note(&members, &full).unwrap();
        assert_eq!(mapped[&b], DeliveryOutcome::Failed);

        let partial = vec![NoteOutcome { note_id: a, outcome: DeliveryOutcome::Delivered }];
        assert!(matches!(
            outcomes_by_note(&members, &partial),
            Err(ServiceError::ValidationError(_))
        ));

        let mut stranger = full.clone();
        stranger.push(NoteOutcome { note_id: Uuid::new_v4(), outcome: DeliveryOutcome::Delivered });
        assert!(outcomes_by_note(&members, &stranger).is_err());

        let mut duplicate = full;
        duplicate.push(NoteOutcome { note_id: a, outcome: DeliveryOutcome::Failed });
        assert!(outcomes_by_note(&members, &duplicate).is_err());
    }
}
