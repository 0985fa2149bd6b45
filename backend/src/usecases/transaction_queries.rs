use crates::domain::{
    repositories::{
        transaction_view::TransactionViewRepository, transactions::TransactionRepository,
        users::UserRepository,
    },
    value_objects::{
        enums::{
            sort_order::SortOrder, transaction_statuses::TransactionStatus, user_roles::UserRole,
        },
        principal::Principal,
        transactions::{
            CommissionRecordDto, ListTransactionsFilter, TransactionDetailDto, TransactionDto,
        },
        transition_guard::available_actions,
    },
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::escrow::{EscrowError, UseCaseResult};

/// Read side: one transaction for a viewer, and the three list screens.
pub struct TransactionQueryUseCase<T, V, U>
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    transaction_repo: Arc<T>,
    view_repo: Arc<V>,
    user_repo: Arc<U>,
}

impl<T, V, U> TransactionQueryUseCase<T, V, U>
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(transaction_repo: Arc<T>, view_repo: Arc<V>, user_repo: Arc<U>) -> Self {
        Self {
            transaction_repo,
            view_repo,
            user_repo,
        }
    }

    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
        viewer_id: Uuid,
    ) -> UseCaseResult<TransactionDetailDto> {
        let transaction = self
            .transaction_repo
            .find_by_id(transaction_id)
            .await
            .map_err(|err| {
                error!(%transaction_id, db_error = ?err, "transactions: failed to load transaction");
                EscrowError::Internal(err)
            })?
            .ok_or(EscrowError::TransactionNotFound)?;

        let viewer = match Principal::party_of(&transaction, viewer_id) {
            Some(party) => party,
            None => {
                if !self.is_operator(viewer_id).await? {
                    let err = EscrowError::Unauthorized(
                        "only the parties or an operator can view this transaction".to_string(),
                    );
                    warn!(
                        %transaction_id,
                        %viewer_id,
                        status = err.status_code().as_u16(),
                        "transactions: viewer is not allowed"
                    );
                    return Err(err);
                }
                Principal::Operator(viewer_id)
            }
        };

        let commission = if transaction.transaction_status() == Some(TransactionStatus::Completed)
        {
            self.transaction_repo
                .find_commission_by_transaction_id(transaction_id)
                .await
                .map_err(|err| {
                    error!(%transaction_id, db_error = ?err, "transactions: failed to load commission");
                    EscrowError::Internal(err)
                })?
                .map(CommissionRecordDto::from)
        } else {
            None
        };

        let actions = available_actions(&transaction, &viewer);
        Ok(TransactionDetailDto {
            transaction: TransactionDto::from(transaction),
            viewer_role: viewer.role(),
            available_actions: actions,
            commission,
        })
    }

    pub async fn list_purchases(
        &self,
        buyer_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> UseCaseResult<Vec<TransactionDto>> {
        validate_filter(&filter)?;
        info!(%buyer_id, "transactions: listing purchases");

        let transactions = self
            .view_repo
            .list_by_buyer(buyer_id, filter)
            .await
            .map_err(|err| {
                error!(%buyer_id, db_error = ?err, "transactions: failed to list purchases");
                EscrowError::Internal(err)
            })?;

        Ok(transactions.into_iter().map(TransactionDto::from).collect())
    }

    pub async fn list_sales(
        &self,
        seller_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> UseCaseResult<Vec<TransactionDto>> {
        validate_filter(&filter)?;
        info!(%seller_id, "transactions: listing sales");

        let transactions = self
            .view_repo
            .list_by_seller(seller_id, filter)
            .await
            .map_err(|err| {
                error!(%seller_id, db_error = ?err, "transactions: failed to list sales");
                EscrowError::Internal(err)
            })?;

        Ok(transactions.into_iter().map(TransactionDto::from).collect())
    }

    /// Submitted payments waiting for an operator, oldest first.
    pub async fn list_pending_verifications(
        &self,
        operator_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> UseCaseResult<Vec<TransactionDto>> {
        validate_filter(&filter)?;

        if !self.is_operator(operator_id).await? {
            let err = EscrowError::Unauthorized("operator role required".to_string());
            warn!(
                %operator_id,
                status = err.status_code().as_u16(),
                "transactions: pending verifications requested by non-operator"
            );
            return Err(err);
        }

        let filter = ListTransactionsFilter {
            status: None,
            sort_order: SortOrder::Asc,
            ..filter
        };
        let transactions = self
            .view_repo
            .list_by_status(TransactionStatus::PaymentSubmitted, filter)
            .await
            .map_err(|err| {
                error!(%operator_id, db_error = ?err, "transactions: failed to list pending verifications");
                EscrowError::Internal(err)
            })?;

        info!(
            %operator_id,
            pending = transactions.len(),
            "transactions: pending verifications loaded"
        );
        Ok(transactions.into_iter().map(TransactionDto::from).collect())
    }

    async fn is_operator(&self, user_id: Uuid) -> UseCaseResult<bool> {
        let role = self.user_repo.find_role(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "transactions: failed to load user role");
            EscrowError::Internal(err)
        })?;
        Ok(role == Some(UserRole::Operator))
    }
}

fn validate_filter(filter: &ListTransactionsFilter) -> UseCaseResult<()> {
    filter
        .resolved_limit()
        .map(|_| ())
        .map_err(|err| EscrowError::InvalidInput(err.to_string()))
}
