use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::transaction_statuses::TransactionStatus;
use crate::infra::db::postgres::schema::transactions;

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = transactions)]
pub struct TransactionEntity {
    pub id: Uuid,
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub sale_price_minor: i64,
    pub commission_rate_bps: i32,
    pub commission_amount_minor: i64,
    pub seller_earnings_minor: i64,
    pub status: String,
    pub payment_method: String,
    pub payment_proof_reference: Option<String>,
    pub platform_payment_reference: Option<String>,
    pub payment_collected_by_platform: bool,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub payment_verified_at: Option<DateTime<Utc>>,
    pub payment_verified_by: Option<Uuid>,
    pub shipping_proof_reference: Option<String>,
    pub delivery_proof_reference: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub seller_paid: bool,
    pub seller_paid_at: Option<DateTime<Utc>>,
    pub seller_payout_amount_minor: Option<i64>,
    pub seller_payout_reference: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionEntity {
    /// `None` when the stored status is not one this service writes.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status)
    }

    pub fn amounts_balance(&self) -> bool {
        self.commission_amount_minor
            .checked_add(self.seller_earnings_minor)
            .is_some_and(|total| total == self.sale_price_minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = transactions)]
pub struct InsertTransactionEntity {
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub sale_price_minor: i64,
    pub commission_rate_bps: i32,
    pub commission_amount_minor: i64,
    pub seller_earnings_minor: i64,
    pub status: String,
    pub payment_method: String,
    pub payment_collected_by_platform: bool,
    pub seller_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle columns written by a guarded transition.
///
/// Identity, parties and money are not part of the changeset, so no
/// transition can rewrite them. `None` fields are skipped by diesel, which
/// keeps set-once timestamps from ever being cleared.
#[derive(Debug, Clone, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = transactions)]
pub struct UpdateTransactionEntity {
    pub status: String,
    pub payment_proof_reference: Option<String>,
    pub platform_payment_reference: Option<String>,
    pub payment_collected_by_platform: bool,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub payment_verified_at: Option<DateTime<Utc>>,
    pub payment_verified_by: Option<Uuid>,
    pub shipping_proof_reference: Option<String>,
    pub delivery_proof_reference: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub seller_paid: bool,
    pub seller_paid_at: Option<DateTime<Utc>>,
    pub seller_payout_amount_minor: Option<i64>,
    pub seller_payout_reference: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TransactionEntity> for UpdateTransactionEntity {
    fn from(value: &TransactionEntity) -> Self {
        Self {
            status: value.status.clone(),
            payment_proof_reference: value.payment_proof_reference.clone(),
            platform_payment_reference: value.platform_payment_reference.clone(),
            payment_collected_by_platform: value.payment_collected_by_platform,
            payment_submitted_at: value.payment_submitted_at,
            payment_verified_at: value.payment_verified_at,
            payment_verified_by: value.payment_verified_by,
            shipping_proof_reference: value.shipping_proof_reference.clone(),
            delivery_proof_reference: value.delivery_proof_reference.clone(),
            shipped_at: value.shipped_at,
            delivered_at: value.delivered_at,
            completed_at: value.completed_at,
            released_at: value.released_at,
            seller_paid: value.seller_paid,
            seller_paid_at: value.seller_paid_at,
            seller_payout_amount_minor: value.seller_payout_amount_minor,
            seller_payout_reference: value.seller_payout_reference.clone(),
            cancelled_at: value.cancelled_at,
            cancelled_by: value.cancelled_by,
            cancellation_reason: value.cancellation_reason.clone(),
            updated_at: value.updated_at,
        }
    }
}

/// A 1000.00 sale at 2% between two fresh parties, in the given status.
#[cfg(test)]
pub(crate) fn sample_transaction(status: TransactionStatus) -> TransactionEntity {
    use chrono::TimeZone;

    let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    TransactionEntity {
        id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        buyer_id: Uuid::new_v4(),
        seller_id: Uuid::new_v4(),
        sale_price_minor: 100_000,
        commission_rate_bps: 200,
        commission_amount_minor: 2_000,
        seller_earnings_minor: 98_000,
        status: status.to_string(),
        payment_method: "bank_transfer".to_string(),
        payment_proof_reference: None,
        platform_payment_reference: None,
        payment_collected_by_platform: false,
        payment_submitted_at: None,
        payment_verified_at: None,
        payment_verified_by: None,
        shipping_proof_reference: None,
        delivery_proof_reference: None,
        shipped_at: None,
        delivered_at: None,
        completed_at: None,
        released_at: None,
        seller_paid: false,
        seller_paid_at: None,
        seller_payout_amount_minor: None,
        seller_payout_reference: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at,
        updated_at: created_at,
    }
}
