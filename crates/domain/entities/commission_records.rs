use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::commission_records;

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = commission_records)]
pub struct CommissionRecordEntity {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub amount_minor: i64,
    pub rate_bps: i32,
    pub status: String,
    pub collected_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Only built by the completion routine in `value_objects::settlement`.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = commission_records)]
pub struct InsertCommissionRecordEntity {
    pub transaction_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub amount_minor: i64,
    pub rate_bps: i32,
    pub status: String,
    pub collected_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
