use anyhow::{Result, bail};
use async_trait::async_trait;
use diesel::{PgConnection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use tracing::debug;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{commission_records, products, transactions},
        storage_errors::into_storage_error,
    },
};
use domain::{
    entities::{
        commission_records::CommissionRecordEntity,
        products::ProductEntity,
        transactions::{TransactionEntity, UpdateTransactionEntity},
    },
    repositories::{conflict::StorageConflict, transactions::TransactionRepository},
    value_objects::{
        enums::{product_statuses::ProductStatus, transaction_statuses::TransactionStatus},
        reservation::{
            ReservationOutcome, ReservationRejection, ReservationRequest, check_reservation,
            draft_transaction,
        },
        settlement::Settlement,
    },
};

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
    lock_timeout_ms: u64,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>, lock_timeout_ms: u64) -> Self {
        Self {
            db_pool,
            lock_timeout_ms,
        }
    }
}

/// Bounds every lock wait inside the surrounding database transaction.
fn set_lock_timeout(conn: &mut PgConnection, lock_timeout_ms: u64) -> QueryResult<usize> {
    diesel::sql_query(format!("SET LOCAL lock_timeout = '{lock_timeout_ms}ms'")).execute(conn)
}

// Diesel is synchronous and these queries may wait on row locks, so every
// body runs on the blocking threadpool.
#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn reserve(&self, request: ReservationRequest) -> Result<ReservationOutcome> {
        let db_pool = Arc::clone(&self.db_pool);
        let lock_timeout_ms = self.lock_timeout_ms;

        Ok(task::spawn_blocking(move || -> Result<ReservationOutcome> {
            let mut conn = db_pool.get()?;

            // Products are always locked before transactions.
            let outcome = conn
                .transaction::<ReservationOutcome, anyhow::Error, _>(|conn| {
                    set_lock_timeout(conn, lock_timeout_ms)?;

                    let Some(product) = products::table
                        .find(request.product_id)
                        .select(ProductEntity::as_select())
                        .for_update()
                        .first::<ProductEntity>(conn)
                        .optional()?
                    else {
                        return Ok(ReservationOutcome::Rejected(
                            ReservationRejection::ProductUnavailable,
                        ));
                    };

                    let open_transactions = transactions::table
                        .filter(transactions::product_id.eq(request.product_id))
                        .filter(
                            transactions::status.eq_any(TransactionStatus::open_status_strings()),
                        )
                        .select(TransactionEntity::as_select())
                        .load::<TransactionEntity>(conn)?;

                    if let Err(rejection) =
                        check_reservation(&product, request.buyer_id, &open_transactions)
                    {
                        return Ok(ReservationOutcome::Rejected(rejection));
                    }

                    let draft = draft_transaction(&product, &request)?;
                    let reserved = insert_into(transactions::table)
                        .values(&draft)
                        .returning(TransactionEntity::as_select())
                        .get_result::<TransactionEntity>(conn)?;

                    Ok(ReservationOutcome::Reserved(reserved))
                })
                .map_err(into_storage_error)?;

            Ok(outcome)
        })
        .await??)
    }

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<TransactionEntity>> {
            let mut conn = db_pool.get()?;

            let result = transactions::table
                .find(transaction_id)
                .select(TransactionEntity::as_select())
                .first::<TransactionEntity>(&mut conn)
                .optional()?;

            Ok(result)
        })
        .await??)
    }

    async fn save_transition(
        &self,
        expected_status: TransactionStatus,
        transaction: TransactionEntity,
    ) -> Result<TransactionEntity> {
        if transaction.transaction_status() == Some(TransactionStatus::Completed) {
            bail!(
                "transaction {} must be completed through save_settlement",
                transaction.id
            );
        }

        let db_pool = Arc::clone(&self.db_pool);
        let lock_timeout_ms = self.lock_timeout_ms;

        let saved = task::spawn_blocking(move || -> Result<TransactionEntity> {
            let mut conn = db_pool.get()?;
            let changes = UpdateTransactionEntity::from(&transaction);

            conn.transaction::<TransactionEntity, anyhow::Error, _>(|conn| {
                set_lock_timeout(conn, lock_timeout_ms)?;

                let updated = update(transactions::table)
                    .filter(transactions::id.eq(transaction.id))
                    .filter(transactions::status.eq(expected_status.to_string()))
                    .set(&changes)
                    .returning(TransactionEntity::as_select())
                    .get_result::<TransactionEntity>(conn)
                    .optional()?;

                updated.ok_or_else(|| {
                    anyhow::Error::new(StorageConflict(format!(
                        "transaction {} is no longer {expected_status}",
                        transaction.id
                    )))
                })
            })
            .map_err(into_storage_error)
        })
        .await??;

        debug!(
            transaction_id = %saved.id,
            from = %expected_status,
            to = %saved.status,
            "transactions: transition saved"
        );
        Ok(saved)
    }

    async fn save_settlement(
        &self,
        expected_status: TransactionStatus,
        settlement: Settlement,
    ) -> Result<TransactionEntity> {
        let db_pool = Arc::clone(&self.db_pool);
        let lock_timeout_ms = self.lock_timeout_ms;
        let commission_minor = settlement.commission.amount_minor;

        let saved = task::spawn_blocking(move || -> Result<TransactionEntity> {
            let mut conn = db_pool.get()?;
            let completed = &settlement.transaction;

            conn.transaction::<TransactionEntity, anyhow::Error, _>(|conn| {
                set_lock_timeout(conn, lock_timeout_ms)?;

                products::table
                    .find(completed.product_id)
                    .select(products::id)
                    .for_update()
                    .first::<Uuid>(conn)?;

                let current_status = transactions::table
                    .find(completed.id)
                    .select(transactions::status)
                    .for_update()
                    .first::<String>(conn)?;

                if current_status != expected_status.as_str() {
                    return Err(StorageConflict(format!(
                        "transaction {} is {current_status}, expected {expected_status}",
                        completed.id
                    ))
                    .into());
                }

                let saved = update(transactions::table.find(completed.id))
                    .set(&UpdateTransactionEntity::from(completed))
                    .returning(TransactionEntity::as_select())
                    .get_result::<TransactionEntity>(conn)?;

                insert_into(commission_records::table)
                    .values(&settlement.commission)
                    .execute(conn)?;

                update(products::table.find(completed.product_id))
                    .set((
                        products::status.eq(ProductStatus::Sold.to_string()),
                        products::updated_at.eq(completed.updated_at),
                    ))
                    .execute(conn)?;

                Ok(saved)
            })
            .map_err(into_storage_error)
        })
        .await??;

        debug!(
            transaction_id = %saved.id,
            product_id = %saved.product_id,
            commission_minor,
            "transactions: settlement committed"
        );
        Ok(saved)
    }

    async fn find_commission_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<CommissionRecordEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<CommissionRecordEntity>> {
            let mut conn = db_pool.get()?;

            let result = commission_records::table
                .filter(commission_records::transaction_id.eq(transaction_id))
                .select(CommissionRecordEntity::as_select())
                .first::<CommissionRecordEntity>(&mut conn)
                .optional()?;

            Ok(result)
        })
        .await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        repositories::conflict::is_storage_conflict,
        value_objects::{
            enums::payment_methods::PaymentMethod, money::CommissionRate, settlement::settle,
        },
    };
    use crate::domain::value_objects::enums::user_roles::UserRole;
    use crate::infra::db::postgres::{postgres_connection::establish_connection, schema::app_users};
    use chrono::Utc;
    use std::{
        sync::mpsc,
        thread,
        time::{Duration, Instant},
    };

    fn test_pool() -> Arc<PgPoolSquad> {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        Arc::new(establish_connection(&database_url, 4).expect("database pool"))
    }

    fn seed_user(pool: &PgPoolSquad) -> Uuid {
        let mut conn = pool.get().unwrap();
        let now = Utc::now();
        insert_into(app_users::table)
            .values((
                app_users::id.eq(Uuid::new_v4()),
                app_users::role.eq(UserRole::Member.to_string()),
                app_users::status.eq("active"),
                app_users::created_at.eq(now),
                app_users::updated_at.eq(now),
            ))
            .returning(app_users::id)
            .get_result::<Uuid>(&mut conn)
            .unwrap()
    }

    fn seed_product(pool: &PgPoolSquad, price_minor: i64) -> ProductEntity {
        let seller_id = seed_user(pool);
        let mut conn = pool.get().unwrap();
        let now = Utc::now();
        insert_into(products::table)
            .values((
                products::id.eq(Uuid::new_v4()),
                products::seller_id.eq(seller_id),
                products::title.eq("Vintage lens"),
                products::price_minor.eq(price_minor),
                products::status.eq(ProductStatus::Active.to_string()),
                products::created_at.eq(now),
                products::updated_at.eq(now),
            ))
            .returning(ProductEntity::as_select())
            .get_result::<ProductEntity>(&mut conn)
            .unwrap()
    }

    fn reservation(product_id: Uuid, buyer_id: Uuid) -> ReservationRequest {
        ReservationRequest {
            product_id,
            buyer_id,
            payment_method: PaymentMethod::BankTransfer,
            commission_rate: CommissionRate::default(),
            requested_at: Utc::now(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires DATABASE_URL with migrations applied"]
    async fn concurrent_reservations_leave_a_single_holder() {
        let pool = test_pool();
        let product = seed_product(&pool, 100_000);
        let repo = Arc::new(TransactionPostgres::new(Arc::clone(&pool), 3_000));

        let attempts = (0..4)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let request = reservation(product.id, seed_user(&pool));
                tokio::spawn(async move { repo.reserve(request).await })
            })
            .collect::<Vec<_>>();

        let mut reserved = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(ReservationOutcome::Reserved(_)) => reserved += 1,
                Ok(ReservationOutcome::Rejected(rejection)) => {
                    assert_eq!(rejection, ReservationRejection::ReservedByAnotherBuyer)
                }
                Err(err) => assert!(is_storage_conflict(&err), "unexpected error: {err:?}"),
            }
        }
        assert_eq!(reserved, 1);

        let mut conn = pool.get().unwrap();
        let open = transactions::table
            .filter(transactions::product_id.eq(product.id))
            .filter(transactions::status.eq_any(TransactionStatus::open_status_strings()))
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap();
        assert_eq!(open, 1);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL with migrations applied"]
    async fn settlement_commits_commission_and_product_together() {
        let pool = test_pool();
        let product = seed_product(&pool, 100_000);
        let repo = TransactionPostgres::new(Arc::clone(&pool), 3_000);

        let ReservationOutcome::Reserved(pending) = repo
            .reserve(reservation(product.id, seed_user(&pool)))
            .await
            .unwrap()
        else {
            panic!("reservation rejected");
        };

        let mut verified = pending.clone();
        verified.status = TransactionStatus::PaymentVerified.to_string();
        verified.payment_collected_by_platform = true;
        verified.payment_verified_at = Some(Utc::now());
        let verified = repo
            .save_transition(TransactionStatus::PendingPayment, verified)
            .await
            .unwrap();

        let settlement = settle(&verified, Utc::now()).unwrap();
        let completed = repo
            .save_settlement(TransactionStatus::PaymentVerified, settlement.clone())
            .await
            .unwrap();
        assert_eq!(completed.status, "completed");
        assert!(completed.seller_paid);

        let commission = repo
            .find_commission_by_transaction_id(completed.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(commission.amount_minor, 2_000);

        let mut conn = pool.get().unwrap();
        let product_status = products::table
            .find(product.id)
            .select(products::status)
            .first::<String>(&mut conn)
            .unwrap();
        assert_eq!(product_status, "sold");

        let replay = repo
            .save_settlement(TransactionStatus::PaymentVerified, settlement)
            .await
            .unwrap_err();
        assert!(is_storage_conflict(&replay));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL with migrations applied"]
    async fn stale_transition_is_a_conflict() {
        let pool = test_pool();
        let product = seed_product(&pool, 50_000);
        let repo = TransactionPostgres::new(Arc::clone(&pool), 3_000);

        let ReservationOutcome::Reserved(pending) = repo
            .reserve(reservation(product.id, seed_user(&pool)))
            .await
            .unwrap()
        else {
            panic!("reservation rejected");
        };

        let mut cancelled = pending.clone();
        cancelled.status = TransactionStatus::Cancelled.to_string();
        repo.save_transition(TransactionStatus::PendingPayment, cancelled.clone())
            .await
            .unwrap();

        let err = repo
            .save_transition(TransactionStatus::PendingPayment, cancelled)
            .await
            .unwrap_err();
        assert!(is_storage_conflict(&err));
    }

    #[tokio::test(flavor = "current_thread")]
    #[ignore = "requires DATABASE_URL with migrations applied"]
    async fn waiting_on_a_product_lock_leaves_the_runtime_free() {
        let pool = test_pool();
        let product = seed_product(&pool, 80_000);
        let repo = TransactionPostgres::new(Arc::clone(&pool), 3_000);
        let buyer_id = seed_user(&pool);

        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    products::table
                        .find(product.id)
                        .select(products::id)
                        .for_update()
                        .first::<Uuid>(conn)?;
                    locked_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(1_000));
                    Ok(())
                })
                .unwrap();
            })
        };
        locked_rx.recv().unwrap();

        let started = Instant::now();
        let (reserved, timer_fired_after) = tokio::join!(
            repo.reserve(reservation(product.id, buyer_id)),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                started.elapsed()
            }
        );
        let reserve_finished_after = started.elapsed();
        holder.join().unwrap();

        assert!(matches!(reserved.unwrap(), ReservationOutcome::Reserved(_)));
        assert!(reserve_finished_after >= Duration::from_millis(500));
        assert!(
            timer_fired_after < Duration::from_millis(400),
            "timer fired after {timer_fired_after:?}"
        );
    }
}
