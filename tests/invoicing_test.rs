//! Invoicing feed tests: only terminal notes of the customer, within the
//! completion period, with their stored prices.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use freight_dispatch_api::{
    errors::ServiceError,
    models::{shipment_note, DeliveryOutcome, PaymentType, QueueKind},
    services::{
        delivery_runs::{CompleteDeliveryRun, NoteOutcome, OpenDeliveryRun},
        invoicing::InvoicePeriod,
        loading_batches::OpenLoadingBatch,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Loads the note, then returns it to the sender straight from the batch.
async fn return_note(app: &TestApp, note: &shipment_note::Model, truck: &str) {
    let entry = app.register_vehicle("JKT", truck, QueueKind::Loading).await;
    let batch = app
        .state
        .services
        .loading_batches
        .open_batch(OpenLoadingBatch {
            origin_branch_id: "JKT".into(),
            destination_branch_id: note.destination_branch_id.clone(),
            truck_entry_id: entry.id,
            checker_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    app.state
        .services
        .loading_batches
        .add_note(batch.id, note.id)
        .await
        .unwrap();
    app.state
        .services
        .shipment_notes
        .return_to_sender(note.id)
        .await
        .unwrap();
}

/// Loads the note and delivers it on a fresh run at its destination.
async fn deliver_note(app: &TestApp, note: &shipment_note::Model, truck: &str, van: &str) {
    let services = &app.state.services;
    let entry = app.register_vehicle("JKT", truck, QueueKind::Loading).await;
    let batch = services
        .loading_batches
        .open_batch(OpenLoadingBatch {
            origin_branch_id: "JKT".into(),
            destination_branch_id: note.destination_branch_id.clone(),
            truck_entry_id: entry.id,
            checker_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    services.loading_batches.add_note(batch.id, note.id).await.unwrap();
    services.loading_batches.depart(batch.id).await.unwrap();

    app.register_vehicle(&note.destination_branch_id, van, QueueKind::Delivery)
        .await;
    let run = services
        .delivery_runs
        .open_run(OpenDeliveryRun {
            branch_id: note.destination_branch_id.clone(),
            checker_id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            recipient_name: "Warehouse gate".into(),
            start_odometer: 0,
        })
        .await
        .unwrap();
    services.delivery_runs.add_note(run.id, note.id).await.unwrap();
    services.delivery_runs.dispatch(run.id).await.unwrap();
    services
        .delivery_runs
        .complete(
            run.id,
            CompleteDeliveryRun {
                outcomes: vec![NoteOutcome {
                    note_id: note.id,
                    outcome: DeliveryOutcome::Delivered,
                }],
                end_odometer: None,
            },
        )
        .await
        .unwrap();
}

fn today_for(customer_id: Uuid) -> InvoicePeriod {
    let today = Utc::now().date_naive();
    InvoicePeriod {
        customer_id,
        from: today,
        to: today,
        payment_type: None,
    }
}

#[tokio::test]
async fn feed_lists_only_completed_notes_of_the_customer() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let delivered = app
        .create_note_for(customer, "JKT", "SBY", dec!(150000), PaymentType::Credit)
        .await;
    let returned = app
        .create_note_for(customer, "JKT", "SBY", dec!(90000), PaymentType::Cash)
        .await;
    let pending = app
        .create_note_for(customer, "JKT", "SBY", dec!(40000), PaymentType::Credit)
        .await;
    let other_customer = app
        .create_note_for(Uuid::new_v4(), "JKT", "SBY", dec!(70000), PaymentType::Credit)
        .await;

    deliver_note(&app, &delivered, "B 1001 AA", "L 1001 ZZ").await;
    return_note(&app, &returned, "B 1002 BB").await;
    deliver_note(&app, &other_customer, "B 1003 CC", "L 1003 YY").await;

    let feed = app
        .state
        .services
        .invoicing
        .notes_for_invoice(today_for(customer))
        .await
        .unwrap();

    let ids: Vec<_> = feed.notes.iter().map(|n| n.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&delivered.id));
    assert!(ids.contains(&returned.id));
    assert!(!ids.contains(&pending.id));
    assert_eq!(feed.delivered_count, 1);
    assert_eq!(feed.returned_count, 1);
    assert_eq!(feed.total_price, Decimal::from(240_000));
}

#[tokio::test]
async fn feed_filters_by_payment_type_and_period() {
    let app = TestApp::new().await;
    let invoicing = &app.state.services.invoicing;
    let customer = Uuid::new_v4();

    let credit = app
        .create_note_for(customer, "JKT", "SBY", dec!(100000), PaymentType::Credit)
        .await;
    let cod = app
        .create_note_for(customer, "JKT", "SBY", dec!(80000), PaymentType::Cod)
        .await;
    return_note(&app, &credit, "B 2001 AA").await;
    return_note(&app, &cod, "B 2002 BB").await;

    let mut period = today_for(customer);
    period.payment_type = Some(PaymentType::Credit);
    let feed = invoicing.notes_for_invoice(period).await.unwrap();
    assert_eq!(feed.notes.len(), 1);
    assert_eq!(feed.notes[0].id, credit.id);

    let last_week = Utc::now().date_naive() - Duration::days(7);
    let mut past = today_for(customer);
    past.from = last_week;
    past.to = last_week;
    assert!(invoicing.notes_for_invoice(past).await.unwrap().notes.is_empty());
}

#[tokio::test]
async fn inverted_period_is_rejected() {
    let app = TestApp::new().await;
    let mut period = today_for(Uuid::new_v4());
    period.from = period.to + Duration::days(1);

    assert_matches!(
        app.state.services.invoicing.notes_for_invoice(period).await,
        Err(ServiceError::ValidationError(_))
    );
}
