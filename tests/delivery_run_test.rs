//! Delivery run (Lansir) tests: opening on the branch queue, assignment
//! rules, dispatch and completion with per-note outcomes.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use freight_dispatch_api::{
    errors::ServiceError,
    models::{
        delivery_run, loading_batch_item, shipment_note, DeliveryOutcome, EntityRef, NoteStatus,
        QueueKind, QueueStatus, RunStatus,
    },
    services::{
        delivery_runs::{CompleteDeliveryRun, NoteOutcome, OpenDeliveryRun},
        loading_batches::OpenLoadingBatch,
    },
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

fn run_request(branch: &str) -> OpenDeliveryRun {
    OpenDeliveryRun {
        branch_id: branch.to_string(),
        checker_id: Uuid::new_v4(),
        admin_id: Uuid::new_v4(),
        recipient_name: "Front desk".to_string(),
        start_odometer: 12_000,
    }
}

async fn open_run(app: &TestApp, branch: &str, vehicle: &str) -> delivery_run::Model {
    app.register_vehicle(branch, vehicle, QueueKind::Delivery).await;
    app.state
        .services
        .delivery_runs
        .open_run(run_request(branch))
        .await
        .expect("open delivery run")
}

/// Loads the notes into a fresh batch; departs it when `depart` is set.
async fn load_notes(
    app: &TestApp,
    notes: &[&shipment_note::Model],
    truck: &str,
    depart: bool,
) -> Uuid {
    let origin = notes[0].origin_branch_id.clone();
    let destination = notes[0].destination_branch_id.clone();
    let entry = app.register_vehicle(&origin, truck, QueueKind::Loading).await;
    let batches = &app.state.services.loading_batches;
    let batch = batches
        .open_batch(OpenLoadingBatch {
            origin_branch_id: origin,
            destination_branch_id: destination,
            truck_entry_id: entry.id,
            checker_id: Uuid::new_v4(),
        })
        .await
        .expect("open loading batch");
    for note in notes {
        batches.add_note(batch.id, note.id).await.expect("load note");
    }
    if depart {
        batches.depart(batch.id).await.expect("depart batch");
    }
    batch.id
}

fn outcome(note_id: Uuid, outcome: DeliveryOutcome) -> NoteOutcome {
    NoteOutcome { note_id, outcome }
}

#[tokio::test]
async fn opening_a_run_without_a_waiting_vehicle_fails() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;

    assert_matches!(
        runs.open_run(run_request("SBY")).await,
        Err(ServiceError::NoVehicleAvailable(_))
    );
    assert!(runs.list_runs(Some("SBY"), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn transit_note_is_delivered_and_vehicle_returned() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;

    let note = app.create_note("JKT", "SBY").await;
    load_notes(&app, &[&note], "B 1001 AA", true).await;

    let run = open_run(&app, "SBY", "L 1001 ZZ").await;
    assert_eq!(run.status, RunStatus::Open);

    let out = runs.add_note(run.id, note.id).await.unwrap();
    assert_eq!(out.status, NoteStatus::Lansir);

    let dispatched = runs.dispatch(run.id).await.unwrap();
    assert_eq!(dispatched.status, RunStatus::Dispatched);
    assert!(dispatched.dispatched_at.is_some());

    let completed = runs
        .complete(
            run.id,
            CompleteDeliveryRun {
                outcomes: vec![outcome(note.id, DeliveryOutcome::Delivered)],
                end_odometer: Some(12_080),
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.status, RunStatus::Completed);
    assert_eq!(completed.end_odometer, Some(12_080));

    let delivered = app.state.services.shipment_notes.get_note(note.id).await.unwrap();
    assert_eq!(delivered.status, NoteStatus::Terkirim);
    assert!(delivered.completed_at.is_some());

    let vehicle = app
        .state
        .services
        .vehicle_queue
        .get_entry(run.vehicle_entry_id)
        .await
        .unwrap();
    assert_eq!(vehicle.status, QueueStatus::Returned);

    let view = runs.get_run(run.id, true).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].outcome, Some(DeliveryOutcome::Delivered));
    assert!(view.items[0].note.is_resolved());
    assert!(view.vehicle.is_resolved());
}

#[tokio::test]
async fn mixed_outcomes_end_in_terkirim_and_return() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;
    let notes = &app.state.services.shipment_notes;

    let a = app.create_note("JKT", "SBY").await;
    let b = app.create_note("JKT", "SBY").await;
    load_notes(&app, &[&a, &b], "B 2001 AA", true).await;

    let run = open_run(&app, "SBY", "L 2001 ZZ").await;
    runs.add_note(run.id, a.id).await.unwrap();
    runs.add_note(run.id, b.id).await.unwrap();
    runs.dispatch(run.id).await.unwrap();

    runs.complete(
        run.id,
        CompleteDeliveryRun {
            outcomes: vec![
                outcome(b.id, DeliveryOutcome::Failed),
                outcome(a.id, DeliveryOutcome::Delivered),
            ],
            end_odometer: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(notes.get_note(a.id).await.unwrap().status, NoteStatus::Terkirim);
    assert_eq!(notes.get_note(b.id).await.unwrap().status, NoteStatus::Return);
}

#[tokio::test]
async fn loaded_note_leaves_its_open_batch_when_sent_out() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;

    let note = app.create_note("JKT", "SBY").await;
    let batch_id = load_notes(&app, &[&note], "B 3001 AA", false).await;

    let run = open_run(&app, "SBY", "L 3001 ZZ").await;
    let out = runs.add_note(run.id, note.id).await.unwrap();
    assert_eq!(out.status, NoteStatus::Lansir);

    let batch = app
        .state
        .services
        .loading_batches
        .get_batch(batch_id, false)
        .await
        .unwrap();
    assert!(batch.notes.is_empty());
}

#[tokio::test]
async fn batch_order_stays_strict_after_a_note_is_sent_out() {
    let app = TestApp::new().await;
    let batches = &app.state.services.loading_batches;

    let first = app.create_note("JKT", "SBY").await;
    let second = app.create_note("JKT", "SBY").await;
    let batch_id = load_notes(&app, &[&first, &second], "B 3002 AA", false).await;

    let run = open_run(&app, "SBY", "L 3002 ZZ").await;
    app.state
        .services
        .delivery_runs
        .add_note(run.id, first.id)
        .await
        .unwrap();

    let third = app.create_note("JKT", "SBY").await;
    batches.add_note(batch_id, third.id).await.unwrap();

    let positions: Vec<i32> = loading_batch_item::Entity::find()
        .filter(loading_batch_item::Column::BatchId.eq(batch_id))
        .order_by_asc(loading_batch_item::Column::Position)
        .all(&*app.state.db)
        .await
        .unwrap()
        .iter()
        .map(|item| item.position)
        .collect();
    assert_eq!(positions, vec![2, 3]);

    let view = batches.get_batch(batch_id, false).await.unwrap();
    let order: Vec<Uuid> = view
        .notes
        .iter()
        .map(|note| match note {
            EntityRef::Id(id) => *id,
            EntityRef::Resolved(model) => model.id,
        })
        .collect();
    assert_eq!(order, vec![second.id, third.id]);
}

#[tokio::test]
async fn run_assignment_rejections_are_distinguishable() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;

    let pending = app.create_note("JKT", "SBY").await;
    let elsewhere = app.create_note("JKT", "MDN").await;
    load_notes(&app, &[&elsewhere], "B 4001 AA", true).await;
    let taken = app.create_note("JKT", "SBY").await;
    load_notes(&app, &[&taken], "B 4002 BB", true).await;

    let first = open_run(&app, "SBY", "L 4001 ZZ").await;
    let second = open_run(&app, "SBY", "L 4002 YY").await;
    runs.add_note(first.id, taken.id).await.unwrap();

    assert_matches!(
        runs.add_note(second.id, pending.id).await,
        Err(ServiceError::NotEligible(_))
    );
    assert_matches!(
        runs.add_note(second.id, elsewhere.id).await,
        Err(ServiceError::NotEligible(_))
    );
    assert_matches!(
        runs.add_note(second.id, taken.id).await,
        Err(ServiceError::AlreadyAssigned(_))
    );

    let returned = app.create_note("JKT", "SBY").await;
    load_notes(&app, &[&returned], "B 4003 CC", true).await;
    app.state
        .services
        .shipment_notes
        .return_to_sender(returned.id)
        .await
        .unwrap();
    assert_matches!(
        runs.add_note(second.id, returned.id).await,
        Err(ServiceError::AlreadyTerminal(_))
    );

    let view = runs.get_run(second.id, false).await.unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn completion_is_all_or_nothing() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;
    let notes = &app.state.services.shipment_notes;

    let a = app.create_note("JKT", "SBY").await;
    let b = app.create_note("JKT", "SBY").await;
    load_notes(&app, &[&a, &b], "B 5001 AA", true).await;

    let run = open_run(&app, "SBY", "L 5001 ZZ").await;
    runs.add_note(run.id, a.id).await.unwrap();
    runs.add_note(run.id, b.id).await.unwrap();

    let full = CompleteDeliveryRun {
        outcomes: vec![
            outcome(a.id, DeliveryOutcome::Delivered),
            outcome(b.id, DeliveryOutcome::Delivered),
        ],
        end_odometer: None,
    };
    assert_matches!(
        runs.complete(run.id, full.clone()).await,
        Err(ServiceError::InvalidState(_))
    );

    runs.dispatch(run.id).await.unwrap();

    let partial = CompleteDeliveryRun {
        outcomes: vec![outcome(a.id, DeliveryOutcome::Delivered)],
        end_odometer: None,
    };
    assert_matches!(
        runs.complete(run.id, partial).await,
        Err(ServiceError::ValidationError(_))
    );

    let rolled_back_odometer = CompleteDeliveryRun {
        end_odometer: Some(100),
        ..full.clone()
    };
    assert_matches!(
        runs.complete(run.id, rolled_back_odometer).await,
        Err(ServiceError::ValidationError(_))
    );

    assert_eq!(notes.get_note(a.id).await.unwrap().status, NoteStatus::Lansir);
    assert_eq!(notes.get_note(b.id).await.unwrap().status, NoteStatus::Lansir);
    let view = runs.get_run(run.id, false).await.unwrap();
    assert_eq!(view.run.status, RunStatus::Dispatched);

    runs.complete(run.id, full.clone()).await.unwrap();
    assert_matches!(
        runs.complete(run.id, full).await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn empty_run_cannot_dispatch_but_can_be_cancelled() {
    let app = TestApp::new().await;
    let runs = &app.state.services.delivery_runs;

    let run = open_run(&app, "SBY", "L 6001 ZZ").await;
    assert_matches!(runs.dispatch(run.id).await, Err(ServiceError::InvalidState(_)));

    let cancelled = runs.cancel(run.id).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Cancelled);

    let vehicle = app
        .state
        .services
        .vehicle_queue
        .get_entry(run.vehicle_entry_id)
        .await
        .unwrap();
    assert_eq!(vehicle.status, QueueStatus::Returned);

    let open = runs.list_runs(Some("sby"), Some(RunStatus::Open)).await.unwrap();
    assert!(open.is_empty());
}
