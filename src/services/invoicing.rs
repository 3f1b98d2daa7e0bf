use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{shipment_note, NoteStatus, PaymentType},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InvoicePeriod {
    pub customer_id: Uuid,
    /// First day, inclusive
    pub from: NaiveDate,
    /// Last day, inclusive
    pub to: NaiveDate,
    pub payment_type: Option<PaymentType>,
}

/// Completed notes billable to one customer over a period.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceFeed {
    pub customer_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub notes: Vec<shipment_note::Model>,
    pub delivered_count: usize,
    pub returned_count: usize,
    /// Sum of the stored prices of every listed note
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

/// Read-only feed consumed by invoicing and collection reports.
#[derive(Clone)]
pub struct InvoicingService {
    db: Arc<DatabaseConnection>,
}

impl InvoicingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Terminal notes sent by the customer whose completion falls within the
    /// period, oldest completion first.
    #[instrument(skip(self))]
    pub async fn notes_for_invoice(
        &self,
        period: InvoicePeriod,
    ) -> Result<InvoiceFeed, ServiceError> {
        if period.from > period.to {
            return Err(ServiceError::ValidationError(format!(
                "period start {} is after period end {}",
                period.from, period.to
            )));
        }

        let start = period
            .from
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| ServiceError::InvalidInput("invalid period start".into()))?;
        let end = period
            .to
            .succ_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| ServiceError::InvalidInput("invalid period end".into()))?;

        let mut query = shipment_note::Entity::find()
            .filter(shipment_note::Column::SenderId.eq(period.customer_id))
            .filter(shipment_note::Column::Status.is_in(NoteStatus::TERMINAL))
            .filter(shipment_note::Column::CompletedAt.gte(start))
            .filter(shipment_note::Column::CompletedAt.lt(end));
        if let Some(payment_type) = period.payment_type {
            query = query.filter(shipment_note::Column::PaymentType.eq(payment_type));
        }

        let notes = query
            .order_by_asc(shipment_note::Column::CompletedAt)
            .order_by_asc(shipment_note::Column::NoteNumber)
            .all(&*self.db)
            .await?;

        let delivered_count = notes
            .iter()
            .filter(|note| note.status == NoteStatus::Terkirim)
            .count();
        let total_price = notes.iter().map(|note| note.price).sum();

        Ok(InvoiceFeed {
            customer_id: period.customer_id,
            from: period.from,
            to: period.to,
            returned_count: notes.len() - delivered_count,
            delivered_count,
            notes,
            total_price,
        })
    }
}
