use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loading_batch_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub batch_id: Uuid,
    pub note_id: Uuid,
    /// Load order within the batch
    pub position: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::loading_batch::Entity",
        from = "Column::BatchId",
        to = "super::loading_batch::Column::Id",
        on_delete = "Cascade"
    )]
    LoadingBatch,
    #[sea_orm(
        belongs_to = "super::shipment_note::Entity",
        from = "Column::NoteId",
        to = "super::shipment_note::Column::Id"
    )]
    ShipmentNote,
}

impl Related<super::loading_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoadingBatch.def()
    }
}

impl Related<super::shipment_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentNote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
