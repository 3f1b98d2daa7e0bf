use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-note result recorded when a run completes.
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
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOutcome {
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_run_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub run_id: Uuid,
    pub note_id: Uuid,
    pub position: i32,
    pub outcome: Option<DeliveryOutcome>,
    pub added_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::delivery_run::Entity",
        from = "Column::RunId",
        to = "super::delivery_run::Column::Id",
        on_delete = "Cascade"
    )]
    DeliveryRun,
    #[sea_orm(
        belongs_to = "super::shipment_note::Entity",
        from = "Column::NoteId",
        to = "super::shipment_note::Column::Id"
    )]
    ShipmentNote,
}

impl Related<super::delivery_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryRun.def()
    }
}

impl Related<super::shipment_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentNote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
