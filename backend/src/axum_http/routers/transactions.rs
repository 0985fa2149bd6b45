use crate::{
    auth::{AuthUser, JwtKeys},
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    usecases::{escrow::EscrowUseCase, transaction_queries::TransactionQueryUseCase},
};
use axum::{
    Json, Router,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            transaction_view::TransactionViewRepository, transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::{
            clock::SystemClock,
            transactions::{
                CancelTransactionModel, InitiateTransactionModel, ListTransactionsFilter,
                ProofModel, SubmitPaymentModel,
            },
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            transaction_view::TransactionViewPostgres, transactions::TransactionPostgres,
            users::UserPostgres,
        },
    },
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct TransactionsState<T, V, U>
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub escrow: Arc<EscrowUseCase<T, U>>,
    pub queries: Arc<TransactionQueryUseCase<T, V, U>>,
    pub jwt_keys: JwtKeys,
}

// Manual impl: the repositories are shared behind `Arc` and need not be `Clone`.
impl<T, V, U> Clone for TransactionsState<T, V, U>
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            escrow: Arc::clone(&self.escrow),
            queries: Arc::clone(&self.queries),
            jwt_keys: self.jwt_keys.clone(),
        }
    }
}

impl<T, V, U> FromRef<TransactionsState<T, V, U>> for JwtKeys
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    fn from_ref(state: &TransactionsState<T, V, U>) -> Self {
        state.jwt_keys.clone()
    }
}

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let transaction_repository = Arc::new(TransactionPostgres::new(
        Arc::clone(&db_pool),
        config.escrow.lock_timeout_ms,
    ));
    let transaction_view_repository = Arc::new(TransactionViewPostgres::new(Arc::clone(&db_pool)));
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));

    let escrow_usecase = EscrowUseCase::new(
        Arc::clone(&transaction_repository),
        Arc::clone(&user_repository),
        Arc::new(SystemClock),
        config.escrow.commission_rate,
    );
    let queries_usecase = TransactionQueryUseCase::new(
        transaction_repository,
        transaction_view_repository,
        user_repository,
    );

    router(TransactionsState {
        escrow: Arc::new(escrow_usecase),
        queries: Arc::new(queries_usecase),
        jwt_keys: JwtKeys::new(&config.auth.jwt_secret),
    })
}

pub fn router<T, V, U>(state: TransactionsState<T, V, U>) -> Router
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(initiate::<T, V, U>))
        .route("/purchases", get(list_purchases::<T, V, U>))
        .route("/sales", get(list_sales::<T, V, U>))
        .route(
            "/pending-verifications",
            get(list_pending_verifications::<T, V, U>),
        )
        .route("/:id", get(get_transaction::<T, V, U>))
        .route("/:id/payment", post(submit_payment::<T, V, U>))
        .route("/:id/verify", post(verify_payment::<T, V, U>))
        .route("/:id/collect", post(collect_payment::<T, V, U>))
        .route("/:id/ship", post(mark_shipped::<T, V, U>))
        .route("/:id/confirm-delivery", post(confirm_delivery::<T, V, U>))
        .route("/:id/complete", post(complete::<T, V, U>))
        .route("/:id/cancel", post(cancel::<T, V, U>))
        .with_state(state)
}

pub async fn initiate<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Json(model): Json<InitiateTransactionModel>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    info!(%user_id, product_id = %model.product_id, "transactions: initiate request received");

    match state
        .escrow
        .initiate(user_id, model.product_id, model.payment_method)
        .await
    {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_purchases<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Query(filter): Query<ListTransactionsFilter>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state.queries.list_purchases(user_id, filter).await {
        Ok(transactions) => Json(transactions).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_sales<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Query(filter): Query<ListTransactionsFilter>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state.queries.list_sales(user_id, filter).await {
        Ok(transactions) => Json(transactions).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_pending_verifications<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Query(filter): Query<ListTransactionsFilter>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state
        .queries
        .list_pending_verifications(user_id, filter)
        .await
    {
        Ok(transactions) => Json(transactions).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_transaction<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state.queries.get_transaction(transaction_id, user_id).await {
        Ok(detail) => Json(detail).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn submit_payment<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
    Json(model): Json<SubmitPaymentModel>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state
        .escrow
        .submit_payment(
            transaction_id,
            user_id,
            &model.proof_reference,
            &model.platform_payment_reference,
        )
        .await
    {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn verify_payment<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state.escrow.verify_payment(transaction_id, user_id).await {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn collect_payment<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state.escrow.collect_payment(transaction_id, user_id).await {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn mark_shipped<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
    body: Option<Json<ProofModel>>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let model = body.map(|Json(model)| model).unwrap_or_default();

    match state
        .escrow
        .mark_shipped(transaction_id, user_id, model.proof_reference.as_deref())
        .await
    {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn confirm_delivery<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
    body: Option<Json<ProofModel>>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let model = body.map(|Json(model)| model).unwrap_or_default();

    match state
        .escrow
        .confirm_delivery(transaction_id, user_id, model.proof_reference.as_deref())
        .await
    {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn complete<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match state.escrow.complete(transaction_id, user_id).await {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn cancel<T, V, U>(
    State(state): State<TransactionsState<T, V, U>>,
    AuthUser { user_id }: AuthUser,
    Path(transaction_id): Path<Uuid>,
    body: Option<Json<CancelTransactionModel>>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    V: TransactionViewRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let model = body.map(|Json(model)| model).unwrap_or_default();

    match state
        .escrow
        .cancel(transaction_id, user_id, model.reason.as_deref())
        .await
    {
        Ok(transaction) => Json(transaction).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
