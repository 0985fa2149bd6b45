use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::app_users},
};
use domain::{
    entities::app_users::AppUserEntity, repositories::users::UserRepository,
    value_objects::enums::user_roles::UserRole,
};

const ACTIVE_USER_STATUS: &str = "active";

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_role(&self, user_id: Uuid) -> Result<Option<UserRole>> {
        let db_pool = Arc::clone(&self.db_pool);

        let user = task::spawn_blocking(move || -> Result<Option<AppUserEntity>> {
            let mut conn = db_pool.get()?;

            let user = app_users::table
                .find(user_id)
                .select(AppUserEntity::as_select())
                .first::<AppUserEntity>(&mut conn)
                .optional()?;

            Ok(user)
        })
        .await??;

        Ok(user
            .filter(|user| user.status == ACTIVE_USER_STATUS)
            .and_then(|user| UserRole::from_str(&user.role)))
    }
}
