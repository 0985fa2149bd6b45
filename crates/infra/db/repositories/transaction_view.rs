use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transactions},
};
use domain::{
    entities::transactions::TransactionEntity,
    repositories::transaction_view::TransactionViewRepository,
    value_objects::{
        enums::{sort_order::SortOrder, transaction_statuses::TransactionStatus},
        transactions::ListTransactionsFilter,
    },
};

enum ListScope {
    Buyer(Uuid),
    Seller(Uuid),
    Status(TransactionStatus),
}

pub struct TransactionViewPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionViewPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    async fn list(
        &self,
        scope: ListScope,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>> {
        let limit = filter.resolved_limit()?;
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<TransactionEntity>> {
            let mut conn = db_pool.get()?;

            let mut query = transactions::table
                .select(TransactionEntity::as_select())
                .into_boxed();

            query = match scope {
                ListScope::Buyer(buyer_id) => query.filter(transactions::buyer_id.eq(buyer_id)),
                ListScope::Seller(seller_id) => {
                    query.filter(transactions::seller_id.eq(seller_id))
                }
                ListScope::Status(status) => {
                    query.filter(transactions::status.eq(status.to_string()))
                }
            };

            if let Some(status) = &filter.status {
                query = query.filter(transactions::status.eq(status.to_string()));
            }

            query = match filter.sort_order {
                SortOrder::Asc => {
                    query.order((transactions::created_at.asc(), transactions::id.asc()))
                }
                SortOrder::Desc => {
                    query.order((transactions::created_at.desc(), transactions::id.desc()))
                }
            };

            let results = query.limit(limit).load::<TransactionEntity>(&mut conn)?;
            Ok(results)
        })
        .await??)
    }
}

#[async_trait]
impl TransactionViewRepository for TransactionViewPostgres {
    async fn list_by_buyer(
        &self,
        buyer_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>> {
        self.list(ListScope::Buyer(buyer_id), filter).await
    }

    async fn list_by_seller(
        &self,
        seller_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>> {
        self.list(ListScope::Seller(seller_id), filter).await
    }

    async fn list_by_status(
        &self,
        status: TransactionStatus,
        filter: ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>> {
        self.list(ListScope::Status(status), filter).await
    }
}
