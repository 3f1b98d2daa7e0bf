use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::normalize_branch;
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{vehicle_queue_entry, QueueKind, QueueStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterVehicle {
    #[validate(length(min = 1, max = 32))]
    pub branch_id: String,
    /// Plate number or fleet code
    #[validate(length(min = 1, max = 32))]
    pub vehicle_id: String,
    pub queue_kind: QueueKind,
    pub driver_id: Uuid,
    pub helper_id: Option<Uuid>,
}

pub(crate) async fn load_entry<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> Result<Option<vehicle_queue_entry::Model>, ServiceError> {
    Ok(vehicle_queue_entry::Entity::find_by_id(entry_id).one(conn).await?)
}

async fn find_entry<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> Result<vehicle_queue_entry::Model, ServiceError> {
    vehicle_queue_entry::Entity::find_by_id(entry_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Queue entry {} not found", entry_id)))
}

/// Next sequence number for the branch: one past the current maximum.
async fn next_urutan<C: ConnectionTrait>(conn: &C, branch_id: &str) -> Result<i64, ServiceError> {
    let last = vehicle_queue_entry::Entity::find()
        .filter(vehicle_queue_entry::Column::BranchId.eq(branch_id))
        .order_by_desc(vehicle_queue_entry::Column::Urutan)
        .one(conn)
        .await?;
    Ok(last.map(|entry| entry.urutan + 1).unwrap_or(1))
}

fn map_busy_vehicle(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict("vehicle is already out on another run".into())
        }
        _ => ServiceError::DatabaseError(err),
    }
}

/// `WAITING → DELIVERING` for one entry, guarded so that a vehicle already
/// delivering from any branch is never claimed again. Returns false when the
/// guard did not hold.
async fn try_claim<C: ConnectionTrait>(
    conn: &C,
    entry: &vehicle_queue_entry::Model,
) -> Result<bool, ServiceError> {
    let vehicle_busy = Query::select()
        .expr(Expr::val(1))
        .from(vehicle_queue_entry::Entity)
        .and_where(
            Expr::col((vehicle_queue_entry::Entity, vehicle_queue_entry::Column::VehicleId))
                .eq(entry.vehicle_id.clone()),
        )
        .and_where(
            Expr::col((vehicle_queue_entry::Entity, vehicle_queue_entry::Column::Status))
                .eq(QueueStatus::Delivering),
        )
        .to_owned();

    let result = vehicle_queue_entry::Entity::update_many()
        .set(vehicle_queue_entry::ActiveModel {
            status: Set(QueueStatus::Delivering),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(vehicle_queue_entry::Column::Id.eq(entry.id))
        .filter(vehicle_queue_entry::Column::Status.eq(QueueStatus::Waiting))
        .filter(Expr::exists(vehicle_busy).not())
        .exec(conn)
        .await
        .map_err(map_busy_vehicle)?;

    Ok(result.rows_affected == 1)
}

/// Claims the head of the branch queue: the `WAITING` entry with the smallest
/// urutan whose vehicle is not already delivering.
///
/// Callers must hold the branch lock from [`VehicleQueueService::lock_branch`].
pub(crate) async fn claim_next<C: ConnectionTrait>(
    conn: &C,
    branch_id: &str,
    kind: QueueKind,
) -> Result<vehicle_queue_entry::Model, ServiceError> {
    let waiting = vehicle_queue_entry::Entity::find()
        .filter(vehicle_queue_entry::Column::BranchId.eq(branch_id))
        .filter(vehicle_queue_entry::Column::QueueKind.eq(kind))
        .filter(vehicle_queue_entry::Column::Status.eq(QueueStatus::Waiting))
        .order_by_asc(vehicle_queue_entry::Column::Urutan)
        .all(conn)
        .await?;

    for candidate in waiting {
        if try_claim(conn, &candidate).await? {
            info!(entry_id = %candidate.id, vehicle_id = %candidate.vehicle_id, urutan = candidate.urutan, "Vehicle claimed");
            counter!("freight.queue.claims", 1, "kind" => kind.to_string());
            return find_entry(conn, candidate.id).await;
        }
    }

    counter!("freight.queue.no_vehicle", 1, "kind" => kind.to_string());
    Err(ServiceError::NoVehicleAvailable(format!(
        "no {} vehicle waiting at branch {}",
        kind, branch_id
    )))
}

/// Claims one specific entry, checking it serves `branch_id` and `kind`.
///
/// Callers must hold the branch lock.
pub(crate) async fn claim_entry<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
    branch_id: &str,
    kind: QueueKind,
) -> Result<vehicle_queue_entry::Model, ServiceError> {
    let entry = find_entry(conn, entry_id).await?;
    if entry.branch_id != branch_id || entry.queue_kind != kind {
        return Err(ServiceError::NotEligible(format!(
            "queue entry {} is a {} entry at {}, expected {} at {}",
            entry.id, entry.queue_kind, entry.branch_id, kind, branch_id
        )));
    }
    if entry.status != QueueStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "queue entry {} is {}, expected WAITING",
            entry.id, entry.status
        )));
    }
    if !try_claim(conn, &entry).await? {
        return Err(ServiceError::InvalidState(format!(
            "vehicle {} is already out on another run",
            entry.vehicle_id
        )));
    }
    counter!("freight.queue.claims", 1, "kind" => kind.to_string());
    find_entry(conn, entry.id).await
}

/// `DELIVERING → RETURNED`.
pub(crate) async fn release_entry<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> Result<vehicle_queue_entry::Model, ServiceError> {
    let result = vehicle_queue_entry::Entity::update_many()
        .set(vehicle_queue_entry::ActiveModel {
            status: Set(QueueStatus::Returned),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(vehicle_queue_entry::Column::Id.eq(entry_id))
        .filter(vehicle_queue_entry::Column::Status.eq(QueueStatus::Delivering))
        .exec(conn)
        .await?;

    let entry = find_entry(conn, entry_id).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InvalidState(format!(
            "queue entry {} is {}, expected DELIVERING",
            entry.id, entry.status
        )));
    }
    info!(entry_id = %entry.id, vehicle_id = %entry.vehicle_id, "Vehicle released");
    Ok(entry)
}

/// Branch dispatch queues.
///
/// Claims and sequence assignment for a branch are serialized through an
/// in-process async lock per branch, and every status change is a
/// compare-and-set in the store.
#[derive(Clone)]
pub struct VehicleQueueService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    branch_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl VehicleQueueService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            branch_locks: Arc::new(DashMap::new()),
        }
    }

    /// Exclusive access to a branch queue. Take it before opening the
    /// transaction that touches the queue.
    pub async fn lock_branch(&self, branch_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .branch_locks
            .entry(branch_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Registers a vehicle at the tail of a branch queue.
    #[instrument(skip(self, input), fields(branch = %input.branch_id, vehicle = %input.vehicle_id))]
    pub async fn register(
        &self,
        input: RegisterVehicle,
    ) -> Result<vehicle_queue_entry::Model, ServiceError> {
        input.validate()?;
        let branch_id = normalize_branch(&input.branch_id);
        let vehicle_id = input.vehicle_id.trim().to_uppercase();

        let _guard = self.lock_branch(&branch_id).await;
        let txn = self.db.begin().await?;

        let existing = vehicle_queue_entry::Entity::find()
            .filter(vehicle_queue_entry::Column::BranchId.eq(branch_id.as_str()))
            .filter(vehicle_queue_entry::Column::VehicleId.eq(vehicle_id.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "vehicle {} is already registered at branch {}",
                vehicle_id, branch_id
            )));
        }

        let now = Utc::now();
        let urutan = next_urutan(&txn, &branch_id).await?;
        let entry = vehicle_queue_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            vehicle_id: Set(vehicle_id),
            queue_kind: Set(input.queue_kind),
            driver_id: Set(input.driver_id),
            helper_id: Set(input.helper_id),
            urutan: Set(urutan),
            status: Set(QueueStatus::Waiting),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(entry_id = %entry.id, urutan, "Vehicle registered");
        Ok(entry)
    }

    /// Entries for a branch in FIFO order.
    #[instrument(skip(self))]
    pub async fn list_queue(
        &self,
        branch_id: &str,
        kind: Option<QueueKind>,
    ) -> Result<Vec<vehicle_queue_entry::Model>, ServiceError> {
        let mut query = vehicle_queue_entry::Entity::find()
            .filter(vehicle_queue_entry::Column::BranchId.eq(normalize_branch(branch_id)));
        if let Some(kind) = kind {
            query = query.filter(vehicle_queue_entry::Column::QueueKind.eq(kind));
        }
        Ok(query
            .order_by_asc(vehicle_queue_entry::Column::Urutan)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_entry(
        &self,
        entry_id: Uuid,
    ) -> Result<vehicle_queue_entry::Model, ServiceError> {
        find_entry(&*self.db, entry_id).await
    }

    /// Claims the next waiting vehicle at a branch.
    #[instrument(skip(self))]
    pub async fn claim(
        &self,
        branch_id: &str,
        kind: QueueKind,
    ) -> Result<vehicle_queue_entry::Model, ServiceError> {
        let branch_id = normalize_branch(branch_id);
        let _guard = self.lock_branch(&branch_id).await;

        let txn = self.db.begin().await?;
        let entry = claim_next(&txn, &branch_id, kind).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::VehicleClaimed {
                entry_id: entry.id,
                branch_id: entry.branch_id.clone(),
                vehicle_id: entry.vehicle_id.clone(),
            })
            .await;
        Ok(entry)
    }

    /// Marks a delivering vehicle as back at the branch.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        entry_id: Uuid,
    ) -> Result<vehicle_queue_entry::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let entry = release_entry(&txn, entry_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::VehicleReleased { entry_id })
            .await;
        Ok(entry)
    }

    /// Puts a returned vehicle back at the tail of its branch queue.
    #[instrument(skip(self))]
    pub async fn requeue(
        &self,
        entry_id: Uuid,
    ) -> Result<vehicle_queue_entry::Model, ServiceError> {
        let entry = find_entry(&*self.db, entry_id).await?;
        let _guard = self.lock_branch(&entry.branch_id).await;

        let txn = self.db.begin().await?;
        let urutan = next_urutan(&txn, &entry.branch_id).await?;
        let result = vehicle_queue_entry::Entity::update_many()
            .set(vehicle_queue_entry::ActiveModel {
                status: Set(QueueStatus::Waiting),
                urutan: Set(urutan),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(vehicle_queue_entry::Column::Id.eq(entry_id))
            .filter(vehicle_queue_entry::Column::Status.eq(QueueStatus::Returned))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            let current = find_entry(&txn, entry_id).await?;
            warn!(%entry_id, status = %current.status, "Requeue rejected");
            return Err(ServiceError::InvalidState(format!(
                "queue entry {} is {}, expected RETURNED",
                entry_id, current.status
            )));
        }
        let requeued = find_entry(&txn, entry_id).await?;
        txn.commit().await?;

        info!(%entry_id, urutan, "Vehicle requeued");
        self.event_sender
            .send_or_log(Event::VehicleRequeued { entry_id, urutan })
            .await;
        Ok(requeued)
    }

    /// Removes a vehicle from its branch queue. Vehicles out on a run stay.
    #[instrument(skip(self))]
    pub async fn decommission(&self, entry_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let entry = find_entry(&txn, entry_id).await?;
        if entry.status == QueueStatus::Delivering {
            return Err(ServiceError::InvalidState(format!(
                "vehicle {} is out on a run and cannot be decommissioned",
                entry.vehicle_id
            )));
        }

        let result = vehicle_queue_entry::Entity::delete_many()
            .filter(vehicle_queue_entry::Column::Id.eq(entry_id))
            .filter(vehicle_queue_entry::Column::Status.ne(QueueStatus::Delivering))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidState(format!(
                "vehicle {} was claimed before it could be decommissioned",
                entry.vehicle_id
            )));
        }
        txn.commit().await?;

        info!(%entry_id, vehicle_id = %entry.vehicle_id, "Vehicle decommissioned");
        Ok(())
    }
}
