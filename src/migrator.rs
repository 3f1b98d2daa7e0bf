use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_shipment_notes_table::Migration),
            Box::new(m20240101_000002_create_shipment_note_events_table::Migration),
            Box::new(m20240101_000003_create_vehicle_queue_entries_table::Migration),
            Box::new(m20240101_000004_create_loading_batch_tables::Migration),
            Box::new(m20240101_000005_create_delivery_run_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_shipment_notes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_shipment_notes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentNotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentNotes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNotes::NoteNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ShipmentNotes::PickupRequestId).uuid().null())
                        .col(
                            ColumnDef::new(ShipmentNotes::OriginBranchId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNotes::DestinationBranchId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentNotes::SenderId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentNotes::RecipientId).uuid().not_null())
                        .col(
                            ColumnDef::new(ShipmentNotes::CargoDescription)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentNotes::PieceCount).integer().not_null())
                        .col(
                            ColumnDef::new(ShipmentNotes::WeightKg)
                                .decimal_len(12, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNotes::Price)
                                .decimal_len(16, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShipmentNotes::PaymentType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentNotes::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(ShipmentNotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNotes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNotes::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_notes_status")
                        .table(ShipmentNotes::Table)
                        .col(ShipmentNotes::Status)
                        .to_owned(),
                )
                .await?;

            // eligibility lookups by route
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_notes_route_status")
                        .table(ShipmentNotes::Table)
                        .col(ShipmentNotes::OriginBranchId)
                        .col(ShipmentNotes::DestinationBranchId)
                        .col(ShipmentNotes::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_notes_sender_completed")
                        .table(ShipmentNotes::Table)
                        .col(ShipmentNotes::SenderId)
                        .col(ShipmentNotes::CompletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentNotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ShipmentNotes {
        Table,
        Id,
        NoteNumber,
        PickupRequestId,
        OriginBranchId,
        DestinationBranchId,
        SenderId,
        RecipientId,
        CargoDescription,
        PieceCount,
        WeightKg,
        Price,
        PaymentType,
        Status,
        CreatedAt,
        UpdatedAt,
        CompletedAt,
    }
}

mod m20240101_000002_create_shipment_note_events_table {

    use super::m20240101_000001_create_shipment_notes_table::ShipmentNotes;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_shipment_note_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentNoteEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentNoteEvents::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ShipmentNoteEvents::NoteId).uuid().not_null())
                        .col(
                            ColumnDef::new(ShipmentNoteEvents::Kind)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNoteEvents::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentNoteEvents::BranchId)
                                .string_len(32)
                                .null(),
                        )
                        .col(ColumnDef::new(ShipmentNoteEvents::ReferenceId).uuid().null())
                        .col(
                            ColumnDef::new(ShipmentNoteEvents::OccurredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_note_events_note")
                                .from(ShipmentNoteEvents::Table, ShipmentNoteEvents::NoteId)
                                .to(ShipmentNotes::Table, ShipmentNotes::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_note_events_note_id")
                        .table(ShipmentNoteEvents::Table)
                        .col(ShipmentNoteEvents::NoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentNoteEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShipmentNoteEvents {
        Table,
        Id,
        NoteId,
        Kind,
        Status,
        BranchId,
        ReferenceId,
        OccurredAt,
    }
}

mod m20240101_000003_create_vehicle_queue_entries_table {

    use sea_orm_migration::prelude::*;
    use sea_orm_migration::sea_orm::ConnectionTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_vehicle_queue_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(VehicleQueueEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VehicleQueueEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VehicleQueueEntries::BranchId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VehicleQueueEntries::VehicleId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VehicleQueueEntries::QueueKind)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(VehicleQueueEntries::DriverId).uuid().not_null())
                        .col(ColumnDef::new(VehicleQueueEntries::HelperId).uuid().null())
                        .col(
                            ColumnDef::new(VehicleQueueEntries::Urutan)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VehicleQueueEntries::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VehicleQueueEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VehicleQueueEntries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_vehicle_queue_branch_vehicle")
                        .table(VehicleQueueEntries::Table)
                        .col(VehicleQueueEntries::BranchId)
                        .col(VehicleQueueEntries::VehicleId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_vehicle_queue_branch_urutan")
                        .table(VehicleQueueEntries::Table)
                        .col(VehicleQueueEntries::BranchId)
                        .col(VehicleQueueEntries::Urutan)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // at most one DELIVERING entry per vehicle, across branches
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_vehicle_queue_delivering_vehicle \
                     ON vehicle_queue_entries (vehicle_id) WHERE status = 'DELIVERING'",
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(VehicleQueueEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum VehicleQueueEntries {
        Table,
        Id,
        BranchId,
        VehicleId,
        QueueKind,
        DriverId,
        HelperId,
        Urutan,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_loading_batch_tables {

    use super::m20240101_000001_create_shipment_notes_table::ShipmentNotes;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_loading_batch_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LoadingBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LoadingBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LoadingBatches::TruckEntryId).uuid().not_null())
                        .col(
                            ColumnDef::new(LoadingBatches::OriginBranchId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LoadingBatches::DestinationBranchId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(LoadingBatches::CheckerId).uuid().not_null())
                        .col(ColumnDef::new(LoadingBatches::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(LoadingBatches::OpenedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LoadingBatches::DepartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(LoadingBatches::ArrivedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(LoadingBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LoadingBatchItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LoadingBatchItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LoadingBatchItems::BatchId).uuid().not_null())
                        .col(ColumnDef::new(LoadingBatchItems::NoteId).uuid().not_null())
                        .col(ColumnDef::new(LoadingBatchItems::Position).integer().not_null())
                        .col(
                            ColumnDef::new(LoadingBatchItems::AddedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_loading_batch_items_batch")
                                .from(LoadingBatchItems::Table, LoadingBatchItems::BatchId)
                                .to(LoadingBatches::Table, LoadingBatches::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_loading_batch_items_note")
                                .from(LoadingBatchItems::Table, LoadingBatchItems::NoteId)
                                .to(ShipmentNotes::Table, ShipmentNotes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_loading_batch_items_batch_note")
                        .table(LoadingBatchItems::Table)
                        .col(LoadingBatchItems::BatchId)
                        .col(LoadingBatchItems::NoteId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_loading_batch_items_batch_position")
                        .table(LoadingBatchItems::Table)
                        .col(LoadingBatchItems::BatchId)
                        .col(LoadingBatchItems::Position)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_loading_batch_items_note_id")
                        .table(LoadingBatchItems::Table)
                        .col(LoadingBatchItems::NoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LoadingBatchItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(LoadingBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LoadingBatches {
        Table,
        Id,
        TruckEntryId,
        OriginBranchId,
        DestinationBranchId,
        CheckerId,
        Status,
        OpenedAt,
        DepartedAt,
        ArrivedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum LoadingBatchItems {
        Table,
        Id,
        BatchId,
        NoteId,
        Position,
        AddedAt,
    }
}

mod m20240101_000005_create_delivery_run_tables {

    use super::m20240101_000001_create_shipment_notes_table::ShipmentNotes;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_delivery_run_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryRuns::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryRuns::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRuns::VehicleEntryId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryRuns::BranchId).string_len(32).not_null())
                        .col(ColumnDef::new(DeliveryRuns::CheckerId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryRuns::AdminId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryRuns::RecipientName).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryRuns::StartOdometer)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRuns::EndOdometer).big_integer().null())
                        .col(ColumnDef::new(DeliveryRuns::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(DeliveryRuns::OpenedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRuns::DispatchedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRuns::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRuns::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryRunItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryRunItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRunItems::RunId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryRunItems::NoteId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryRunItems::Position).integer().not_null())
                        .col(ColumnDef::new(DeliveryRunItems::Outcome).string_len(16).null())
                        .col(
                            ColumnDef::new(DeliveryRunItems::AddedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_run_items_run")
                                .from(DeliveryRunItems::Table, DeliveryRunItems::RunId)
                                .to(DeliveryRuns::Table, DeliveryRuns::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_run_items_note")
                                .from(DeliveryRunItems::Table, DeliveryRunItems::NoteId)
                                .to(ShipmentNotes::Table, ShipmentNotes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_delivery_run_items_run_note")
                        .table(DeliveryRunItems::Table)
                        .col(DeliveryRunItems::RunId)
                        .col(DeliveryRunItems::NoteId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_delivery_run_items_run_position")
                        .table(DeliveryRunItems::Table)
                        .col(DeliveryRunItems::RunId)
                        .col(DeliveryRunItems::Position)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_run_items_note_id")
                        .table(DeliveryRunItems::Table)
                        .col(DeliveryRunItems::NoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryRunItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryRuns::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DeliveryRuns {
        Table,
        Id,
        VehicleEntryId,
        BranchId,
        CheckerId,
        AdminId,
        RecipientName,
        StartOdometer,
        EndOdometer,
        Status,
        OpenedAt,
        DispatchedAt,
        CompletedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryRunItems {
        Table,
        Id,
        RunId,
        NoteId,
        Position,
        Outcome,
        AddedAt,
    }
}
