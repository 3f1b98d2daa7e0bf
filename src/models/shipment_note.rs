use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a shipment note (STT).
///
/// `PENDING → MUAT → TRANSIT → LANSIR → TERKIRIM`, with `RETURN` reachable
/// from `MUAT`, `TRANSIT` or `LANSIR`. `TERKIRIM` and `RETURN` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "MUAT")]
    Muat,
    #[sea_orm(string_value = "TRANSIT")]
    Transit,
    #[sea_orm(string_value = "LANSIR")]
    Lansir,
    #[sea_orm(string_value = "TERKIRIM")]
    Terkirim,
    #[sea_orm(string_value = "RETURN")]
    Return,
}

impl NoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NoteStatus::Terkirim | NoteStatus::Return)
    }

    /// Statuses from which a note may join a delivery run.
    pub const RUN_ELIGIBLE: [NoteStatus; 2] = [NoteStatus::Muat, NoteStatus::Transit];

    pub const TERMINAL: [NoteStatus; 2] = [NoteStatus::Terkirim, NoteStatus::Return];
}

/// How the consignment is paid for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Paid by the sender at intake
    #[sea_orm(string_value = "CASH")]
    Cash,
    /// Collected from the recipient on delivery
    #[sea_orm(string_value = "COD")]
    Cod,
    /// Billed to the sender's account through invoicing
    #[sea_orm(string_value = "CREDIT")]
    Credit,
}

/// The `shipment_notes` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "shipment_notes")]
#[schema(as = ShipmentNote)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable note number, immutable once issued
    #[sea_orm(unique)]
    pub note_number: String,
    pub pickup_request_id: Option<Uuid>,
    pub origin_branch_id: String,
    pub destination_branch_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub cargo_description: String,
    /// Colly count
    pub piece_count: i32,
    pub weight_kg: Decimal,
    pub price: Decimal,
    pub payment_type: PaymentType,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn route(&self) -> (&str, &str) {
        (&self.origin_branch_id, &self.destination_branch_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment_note_event::Entity")]
    Events,
}

impl Related<super::shipment_note_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
