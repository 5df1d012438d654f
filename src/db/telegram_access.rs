use super::{queries, DbPool};
use crate::store::StoreError;
use crate::telegram::TelegramAccess;
use async_trait::async_trait;
use uuid::Uuid;

pub struct PgTelegramAccess {
    pool: DbPool,
}

impl PgTelegramAccess {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelegramAccess for PgTelegramAccess {
    async fn is_whitelisted(&self, user_id: i64) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar(queries::IS_TELEGRAM_WHITELISTED)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn has_authorized_session(&self, user_id: i64) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar(queries::HAS_AUTHORIZED_SESSION)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn redeem_invite(
        &self,
        code: &str,
        user_id: i64,
        username: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The conditional UPDATE makes a code single-use under concurrency.
        let claimed: Option<Option<Uuid>> = sqlx::query_scalar(queries::CLAIM_TELEGRAM_INVITE)
            .bind(code)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(truck_id) = claimed else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(queries::UPSERT_TELEGRAM_SESSION)
            .bind(user_id)
            .bind(username)
            .execute(&mut *tx)
            .await?;

        if let Some(truck_id) = truck_id {
            sqlx::query(queries::BIND_TRUCK_TELEGRAM_USER)
                .bind(truck_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
