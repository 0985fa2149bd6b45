use axum::http::StatusCode;
use crates::domain::{
    entities::transactions::TransactionEntity,
    repositories::{
        conflict::is_storage_conflict, transactions::TransactionRepository, users::UserRepository,
    },
    value_objects::{
        clock::Clock,
        enums::{payment_methods::PaymentMethod, user_roles::UserRole},
        evidence::{
            normalize_cancellation_reason, normalize_optional_proof_reference,
            normalize_payment_reference, normalize_proof_reference,
        },
        money::CommissionRate,
        principal::Principal,
        reservation::{ReservationOutcome, ReservationRejection, ReservationRequest},
        transactions::TransactionDto,
        transition_guard::{Transition, TransitionOutcome, TransitionRejection, apply},
    },
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// First try plus one re-read after a storage conflict.
const MAX_TRANSITION_ATTEMPTS: u32 = 2;

const CONFLICT_MESSAGE: &str = "the transaction was modified concurrently, please retry";

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("transaction not found")]
    TransactionNotFound,
    #[error("buyers cannot purchase their own listing")]
    AlreadyOwned,
    #[error("product is not available for purchase")]
    ProductUnavailable,
    #[error("you already have an open transaction for this product")]
    DuplicatePending,
    #[error("{0}")]
    Unauthorized(String),
    #[error("action no longer available: {0}")]
    InvalidState(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EscrowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EscrowError::TransactionNotFound => StatusCode::NOT_FOUND,
            EscrowError::AlreadyOwned | EscrowError::Unauthorized(_) => StatusCode::FORBIDDEN,
            EscrowError::ProductUnavailable
            | EscrowError::DuplicatePending
            | EscrowError::InvalidState(_)
            | EscrowError::Conflict(_) => StatusCode::CONFLICT,
            EscrowError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            EscrowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EscrowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EscrowError::TransactionNotFound => "transaction_not_found",
            EscrowError::AlreadyOwned => "already_owned",
            EscrowError::ProductUnavailable => "product_unavailable",
            EscrowError::DuplicatePending => "duplicate_pending",
            EscrowError::Unauthorized(_) => "unauthorized",
            EscrowError::InvalidState(_) => "invalid_state",
            EscrowError::PreconditionFailed(_) => "precondition_failed",
            EscrowError::InvalidInput(_) => "invalid_input",
            EscrowError::Conflict(_) => "conflict",
            EscrowError::Internal(_) => "internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EscrowError::Conflict(_))
    }

    /// Lost races become `Conflict`; anything else from storage is internal.
    pub fn from_storage(err: anyhow::Error) -> Self {
        if is_storage_conflict(&err) {
            EscrowError::Conflict(CONFLICT_MESSAGE.to_string())
        } else {
            EscrowError::Internal(err)
        }
    }
}

impl From<TransitionRejection> for EscrowError {
    fn from(rejection: TransitionRejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            TransitionRejection::Unauthorized { .. } => EscrowError::Unauthorized(message),
            TransitionRejection::InvalidState { .. } => EscrowError::InvalidState(message),
            TransitionRejection::PreconditionFailed { .. } => {
                EscrowError::PreconditionFailed(message)
            }
        }
    }
}

impl From<ReservationRejection> for EscrowError {
    fn from(rejection: ReservationRejection) -> Self {
        match rejection {
            ReservationRejection::AlreadyOwned => EscrowError::AlreadyOwned,
            ReservationRejection::ProductUnavailable => EscrowError::ProductUnavailable,
            ReservationRejection::DuplicatePending => EscrowError::DuplicatePending,
            ReservationRejection::ReservedByAnotherBuyer => {
                EscrowError::Conflict(rejection.to_string())
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EscrowError>;

/// Who is asking. Cancellation is open to either party, so the capacity is
/// only known once the transaction is loaded.
#[derive(Debug, Clone, Copy)]
enum Actor {
    As(Principal),
    PartyOf(Uuid),
}

pub struct EscrowUseCase<T, U>
where
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    transaction_repo: Arc<T>,
    user_repo: Arc<U>,
    clock: Arc<dyn Clock>,
    commission_rate: CommissionRate,
}

impl<T, U> EscrowUseCase<T, U>
where
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(
        transaction_repo: Arc<T>,
        user_repo: Arc<U>,
        clock: Arc<dyn Clock>,
        commission_rate: CommissionRate,
    ) -> Self {
        Self {
            transaction_repo,
            user_repo,
            clock,
            commission_rate,
        }
    }

    pub async fn initiate(
        &self,
        buyer_id: Uuid,
        product_id: Uuid,
        payment_method: PaymentMethod,
    ) -> UseCaseResult<TransactionDto> {
        info!(
            %buyer_id,
            %product_id,
            payment_method = %payment_method,
            commission_rate_bps = self.commission_rate.bps(),
            "escrow: initiate requested"
        );

        let request = ReservationRequest {
            product_id,
            buyer_id,
            payment_method,
            commission_rate: self.commission_rate,
            requested_at: self.clock.now(),
        };

        match self.transaction_repo.reserve(request).await {
            Ok(ReservationOutcome::Reserved(transaction)) => {
                info!(
                    transaction_id = %transaction.id,
                    %buyer_id,
                    %product_id,
                    sale_price_minor = transaction.sale_price_minor,
                    commission_minor = transaction.commission_amount_minor,
                    "escrow: transaction reserved"
                );
                Ok(TransactionDto::from(transaction))
            }
            Ok(ReservationOutcome::Rejected(rejection)) => {
                let err = EscrowError::from(rejection);
                warn!(
                    %buyer_id,
                    %product_id,
                    status = err.status_code().as_u16(),
                    reason = %rejection,
                    "escrow: reservation rejected"
                );
                Err(err)
            }
            Err(db_err) => {
                let err = EscrowError::from_storage(db_err);
                match &err {
                    EscrowError::Internal(db_err) => error!(
                        %buyer_id,
                        %product_id,
                        db_error = ?db_err,
                        "escrow: failed to reserve product"
                    ),
                    _ => warn!(
                        %buyer_id,
                        %product_id,
                        status = err.status_code().as_u16(),
                        "escrow: reservation lost a concurrent race"
                    ),
                }
                Err(err)
            }
        }
    }

    pub async fn submit_payment(
        &self,
        transaction_id: Uuid,
        buyer_id: Uuid,
        proof_reference: &str,
        platform_payment_reference: &str,
    ) -> UseCaseResult<TransactionDto> {
        let proof_reference = normalize_proof_reference(proof_reference).map_err(invalid_input)?;
        let platform_payment_reference =
            normalize_payment_reference(platform_payment_reference).map_err(invalid_input)?;

        self.run_transition(
            transaction_id,
            Actor::As(Principal::Buyer(buyer_id)),
            Transition::SubmitPayment {
                proof_reference,
                platform_payment_reference,
            },
        )
        .await
    }

    pub async fn verify_payment(
        &self,
        transaction_id: Uuid,
        operator_id: Uuid,
    ) -> UseCaseResult<TransactionDto> {
        let operator = self.operator_principal(operator_id).await?;
        self.run_transition(transaction_id, Actor::As(operator), Transition::VerifyPayment)
            .await
    }

    pub async fn collect_payment(
        &self,
        transaction_id: Uuid,
        operator_id: Uuid,
    ) -> UseCaseResult<TransactionDto> {
        let operator = self.operator_principal(operator_id).await?;
        self.run_transition(transaction_id, Actor::As(operator), Transition::CollectPayment)
            .await
    }

    pub async fn mark_shipped(
        &self,
        transaction_id: Uuid,
        seller_id: Uuid,
        proof_reference: Option<&str>,
    ) -> UseCaseResult<TransactionDto> {
        let proof_reference =
            normalize_optional_proof_reference(proof_reference).map_err(invalid_input)?;

        self.run_transition(
            transaction_id,
            Actor::As(Principal::Seller(seller_id)),
            Transition::Ship { proof_reference },
        )
        .await
    }

    /// Delivery confirmation settles the transaction in the same commit.
    pub async fn confirm_delivery(
        &self,
        transaction_id: Uuid,
        buyer_id: Uuid,
        proof_reference: Option<&str>,
    ) -> UseCaseResult<TransactionDto> {
        let proof_reference =
            normalize_optional_proof_reference(proof_reference).map_err(invalid_input)?;

        self.run_transition(
            transaction_id,
            Actor::As(Principal::Buyer(buyer_id)),
            Transition::ConfirmDelivery { proof_reference },
        )
        .await
    }

    pub async fn complete(
        &self,
        transaction_id: Uuid,
        operator_id: Uuid,
    ) -> UseCaseResult<TransactionDto> {
        let operator = self.operator_principal(operator_id).await?;
        self.run_transition(transaction_id, Actor::As(operator), Transition::Complete)
            .await
    }

    pub async fn cancel(
        &self,
        transaction_id: Uuid,
        actor_id: Uuid,
        reason: Option<&str>,
    ) -> UseCaseResult<TransactionDto> {
        let reason = normalize_cancellation_reason(reason).map_err(invalid_input)?;

        self.run_transition(
            transaction_id,
            Actor::PartyOf(actor_id),
            Transition::Cancel { reason },
        )
        .await
    }

    async fn operator_principal(&self, user_id: Uuid) -> UseCaseResult<Principal> {
        let role = self.user_repo.find_role(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "escrow: failed to load user role");
            EscrowError::Internal(err)
        })?;

        match role {
            Some(UserRole::Operator) => Ok(Principal::Operator(user_id)),
            _ => {
                let err = EscrowError::Unauthorized("operator role required".to_string());
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "escrow: operator action attempted by non-operator"
                );
                Err(err)
            }
        }
    }

    async fn load(&self, transaction_id: Uuid) -> UseCaseResult<TransactionEntity> {
        self.transaction_repo
            .find_by_id(transaction_id)
            .await
            .map_err(|err| {
                error!(%transaction_id, db_error = ?err, "escrow: failed to load transaction");
                EscrowError::Internal(err)
            })?
            .ok_or(EscrowError::TransactionNotFound)
    }

    async fn run_transition(
        &self,
        transaction_id: Uuid,
        actor: Actor,
        transition: Transition,
    ) -> UseCaseResult<TransactionDto> {
        let action = transition.action();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let current = self.load(transaction_id).await?;

            let principal = match actor {
                Actor::As(principal) => principal,
                Actor::PartyOf(user_id) => Principal::party_of(&current, user_id).ok_or_else(
                    || {
                        EscrowError::Unauthorized(
                            "only the buyer or the seller can do this".to_string(),
                        )
                    },
                )?,
            };

            let outcome = apply(&current, &principal, transition.clone(), self.clock.now())
                .map_err(|rejection| {
                    let err = EscrowError::from(rejection);
                    warn!(
                        %transaction_id,
                        %action,
                        role = %principal.role(),
                        from = %current.status,
                        status = err.status_code().as_u16(),
                        "escrow: transition rejected"
                    );
                    err
                })?;

            let Some(expected_status) = current.transaction_status() else {
                return Err(EscrowError::InvalidState(current.status));
            };

            let saved = match outcome {
                TransitionOutcome::Unchanged => {
                    info!(%transaction_id, %action, "escrow: transition already applied");
                    return Ok(TransactionDto::from(current));
                }
                TransitionOutcome::Updated(next) => {
                    self.transaction_repo
                        .save_transition(expected_status, next)
                        .await
                }
                TransitionOutcome::Completed(settlement) => {
                    self.transaction_repo
                        .save_settlement(expected_status, settlement)
                        .await
                }
            };

            match saved {
                Ok(transaction) => {
                    info!(
                        %transaction_id,
                        %action,
                        from = %expected_status,
                        to = %transaction.status,
                        "escrow: transition applied"
                    );
                    return Ok(TransactionDto::from(transaction));
                }
                Err(err) if is_storage_conflict(&err) && attempt < MAX_TRANSITION_ATTEMPTS => {
                    warn!(
                        %transaction_id,
                        %action,
                        attempt,
                        conflict = %err,
                        "escrow: concurrent modification, re-reading"
                    );
                }
                Err(err) => {
                    let err = EscrowError::from_storage(err);
                    match &err {
                        EscrowError::Internal(db_err) => error!(
                            %transaction_id,
                            %action,
                            db_error = ?db_err,
                            "escrow: failed to persist transition"
                        ),
                        _ => warn!(
                            %transaction_id,
                            %action,
                            status = err.status_code().as_u16(),
                            "escrow: transition lost a concurrent race"
                        ),
                    }
                    return Err(err);
                }
            }
        }
    }
}

fn invalid_input(err: anyhow::Error) -> EscrowError {
    EscrowError::InvalidInput(err.to_string())
}
