use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::shipment_note::NoteStatus;

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
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteEventKind {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "LOADED")]
    Loaded,
    #[sea_orm(string_value = "DEPARTED")]
    Departed,
    #[sea_orm(string_value = "ARRIVED")]
    Arrived,
    #[sea_orm(string_value = "OUT_FOR_DELIVERY")]
    OutForDelivery,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "RETURNED")]
    Returned,
}

/// Append-only history of a note; drives public tracking.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipment_note_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub note_id: Uuid,
    pub kind: NoteEventKind,
    /// Note status after the event
    pub status: NoteStatus,
    pub branch_id: Option<String>,
    /// Loading batch or delivery run that caused the event
    pub reference_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment_note::Entity",
        from = "Column::NoteId",
        to = "super::shipment_note::Column::Id",
        on_delete = "Cascade"
    )]
    ShipmentNote,
}

impl Related<super::shipment_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentNote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
