use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::{commission_records::CommissionRecordEntity, transactions::TransactionEntity},
    value_objects::{
        enums::transaction_statuses::TransactionStatus,
        reservation::{ReservationOutcome, ReservationRequest},
        settlement::Settlement,
    },
};

/// Writes go through compare-and-set on `status`; a lost race surfaces as a
/// `StorageConflict` inside the returned error.
#[async_trait]
#[automock]
pub trait TransactionRepository {
    /// Locks the product, checks who already holds it and inserts a
    /// `pending_payment` transaction, all in one database transaction.
    async fn reserve(&self, request: ReservationRequest) -> Result<ReservationOutcome>;

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>>;

    async fn save_transition(
        &self,
        expected_status: TransactionStatus,
        transaction: TransactionEntity,
    ) -> Result<TransactionEntity>;

    /// Commits the completed transaction, its commission record and the
    /// product's `sold` flip together.
    async fn save_settlement(
        &self,
        expected_status: TransactionStatus,
        settlement: Settlement,
    ) -> Result<TransactionEntity>;

    async fn find_commission_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<CommissionRecordEntity>>;
}
