use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::product_statuses::ProductStatus;
use crate::infra::db::postgres::schema::products;

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = products)]
pub struct ProductEntity {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price_minor: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductEntity {
    pub fn product_status(&self) -> Option<ProductStatus> {
        ProductStatus::from_str(&self.status)
    }
}
