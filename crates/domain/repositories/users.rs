use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::user_roles::UserRole;

#[async_trait]
#[automock]
pub trait UserRepository {
    /// Role of an active user; `None` for unknown or disabled accounts.
    async fn find_role(&self, user_id: Uuid) -> Result<Option<UserRole>>;
}
