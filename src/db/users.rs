//! User directory.

use super::{DbError, is_unique_violation};
use chat_proto::User;
use sqlx::SqlitePool;

/// Repository for registered users.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user. Fails with [`DbError::UserExists`] on a duplicate id.
    pub async fn create(&self, user: &User) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO users (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(now)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return DbError::UserExists(user.id.clone());
                }
                DbError::from(e)
            })?;
        Ok(())
    }

    /// Delete a user; membership and presence rows cascade.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|(id, name)| User { id, name }))
    }

    /// Every registered user, ordered by id.
    pub async fn list(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM users ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| User { id, name }).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, DbError};
    use chat_proto::User;

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            name: id.to_uppercase(),
        }
    }

    #[tokio::test]
    async fn create_get_delete() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().create(&user("alice")).await.unwrap();

        let got = db.users().get("alice").await.unwrap().unwrap();
        assert_eq!(got.name, "ALICE");
        assert!(matches!(
            db.users().create(&user("alice")).await,
            Err(DbError::UserExists(_))
        ));

        assert!(db.users().delete("alice").await.unwrap());
        assert!(db.users().get("alice").await.unwrap().is_none());
        assert!(!db.users().delete("alice").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_ordered() {
        let db = Database::new(":memory:").await.unwrap();
        for id in ["carol", "alice", "bob"] {
            db.users().create(&user(id)).await.unwrap();
        }
        let ids: Vec<String> = db.users().list().await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["alice", "bob", "carol"]);
    }
}
