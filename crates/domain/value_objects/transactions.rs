use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{commission_records::CommissionRecordEntity, transactions::TransactionEntity},
    value_objects::{
        enums::{
            payment_methods::PaymentMethod, sort_order::SortOrder,
            transaction_statuses::TransactionStatus,
        },
        principal::ActorRole,
        transition_guard::TransitionAction,
    },
};

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiateTransactionModel {
    pub product_id: Uuid,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitPaymentModel {
    pub proof_reference: String,
    pub platform_payment_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProofModel {
    pub proof_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CancelTransactionModel {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDto {
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
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransactionEntity> for TransactionDto {
    fn from(value: TransactionEntity) -> Self {
        Self {
            id: value.id,
            product_id: value.product_id,
            buyer_id: value.buyer_id,
            seller_id: value.seller_id,
            sale_price_minor: value.sale_price_minor,
            commission_rate_bps: value.commission_rate_bps,
            commission_amount_minor: value.commission_amount_minor,
            seller_earnings_minor: value.seller_earnings_minor,
            status: value.status,
            payment_method: value.payment_method,
            payment_proof_reference: value.payment_proof_reference,
            platform_payment_reference: value.platform_payment_reference,
            payment_collected_by_platform: value.payment_collected_by_platform,
            payment_submitted_at: value.payment_submitted_at,
            payment_verified_at: value.payment_verified_at,
            shipping_proof_reference: value.shipping_proof_reference,
            delivery_proof_reference: value.delivery_proof_reference,
            shipped_at: value.shipped_at,
            delivered_at: value.delivered_at,
            completed_at: value.completed_at,
            released_at: value.released_at,
            seller_paid: value.seller_paid,
            seller_paid_at: value.seller_paid_at,
            seller_payout_amount_minor: value.seller_payout_amount_minor,
            seller_payout_reference: value.seller_payout_reference,
            cancelled_at: value.cancelled_at,
            cancellation_reason: value.cancellation_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionRecordDto {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub amount_minor: i64,
    pub rate_bps: i32,
    pub status: String,
    pub collected_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
}

impl From<CommissionRecordEntity> for CommissionRecordDto {
    fn from(value: CommissionRecordEntity) -> Self {
        Self {
            id: value.id,
            transaction_id: value.transaction_id,
            amount_minor: value.amount_minor,
            rate_bps: value.rate_bps,
            status: value.status,
            collected_at: value.collected_at,
            paid_at: value.paid_at,
        }
    }
}

/// A transaction as one viewer sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDetailDto {
    #[serde(flatten)]
    pub transaction: TransactionDto,
    pub viewer_role: ActorRole,
    pub available_actions: Vec<TransitionAction>,
    pub commission: Option<CommissionRecordDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListTransactionsFilter {
    pub status: Option<TransactionStatus>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl ListTransactionsFilter {
    pub fn resolved_limit(&self) -> Result<i64> {
        match self.limit {
            None => Ok(DEFAULT_LIST_LIMIT),
            Some(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => bail!("Invalid limit: {limit} is outside 1..={MAX_LIST_LIMIT}"),
        }
    }
}
