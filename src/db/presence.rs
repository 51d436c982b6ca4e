//! Per-(user, platform) online status.

use super::DbError;
use chat_proto::ClientStatus;
use sqlx::SqlitePool;

pub struct PresenceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PresenceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Recorded status; a pair never seen reads as offline.
    pub async fn status(&self, uid: &str, platform: &str) -> Result<ClientStatus, DbError> {
        let online = sqlx::query_scalar::<_, bool>(
            "SELECT is_online FROM user_status WHERE user_id = ? AND platform = ?",
        )
        .bind(uid)
        .bind(platform)
        .fetch_optional(self.pool)
        .await?
        .unwrap_or(false);

        Ok(ClientStatus {
            id: uid.to_string(),
            platform: platform.to_string(),
            is_online: online,
        })
    }

    pub async fn set(&self, uid: &str, platform: &str, online: bool) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO user_status (user_id, platform, is_online, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, platform)
            DO UPDATE SET is_online = excluded.is_online, updated_at = excluded.updated_at
            "#,
        )
        .bind(uid)
        .bind(platform)
        .bind(online)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
