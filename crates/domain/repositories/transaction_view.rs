use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::transactions::TransactionEntity,
    value_objects::{
        enums::transaction_statuses::TransactionStatus, transactions::ListTransactionsFilter,
    },
};

#[async_trait]
#[automock]
pub trait TransactionViewRepository {
    async fn list_by_buyer(
        &self,
        buyer_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>>;

    async fn list_by_seller(
        &self,
        seller_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>>;

    async fn list_by_status(
        &self,
        status: TransactionStatus,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>>;
}
