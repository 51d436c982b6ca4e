//! Rooms and room membership.

use super::{DbError, is_foreign_key_violation, is_unique_violation};
use chat_proto::{Room, User};
use sqlx::SqlitePool;

/// Repository for rooms and their members.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a room with `owner` as its first member and manager.
    ///
    /// Room and owner membership are inserted in one transaction.
    pub async fn create(&self, room: &Room, owner: &str) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO rooms (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&room.id)
            .bind(&room.name)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return DbError::RoomExists(room.id.clone());
                }
                DbError::from(e)
            })?;

        sqlx::query(
            "INSERT INTO room_members (room_id, member, is_manager, joined_at) VALUES (?, ?, 1, ?)",
        )
        .bind(&room.id)
        .bind(owner)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return DbError::UserNotFound(owner.to_string());
            }
            DbError::from(e)
        })?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Room>, DbError> {
        let row = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|(id, name)| Room { id, name }))
    }

    /// Rooms `uid` is a member of.
    pub async fn rooms_for(&self, uid: &str) -> Result<Vec<Room>, DbError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT r.id, r.name FROM room_members AS m
            JOIN rooms AS r ON r.id = m.room_id
            WHERE m.member = ?
            ORDER BY r.id
            "#,
        )
        .bind(uid)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, name)| Room { id, name }).collect())
    }

    /// Members of a room, optionally only its managers.
    pub async fn members(&self, room_id: &str, only_managers: bool) -> Result<Vec<User>, DbError> {
        let sql = if only_managers {
            r#"
            SELECT u.id, u.name FROM room_members AS m
            JOIN users AS u ON u.id = m.member
            WHERE m.room_id = ? AND m.is_manager = 1
            ORDER BY u.id
            "#
        } else {
            r#"
            SELECT u.id, u.name FROM room_members AS m
            JOIN users AS u ON u.id = m.member
            WHERE m.room_id = ?
            ORDER BY u.id
            "#
        };
        let rows = sqlx::query_as::<_, (String, String)>(sql)
            .bind(room_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| User { id, name }).collect())
    }

    /// Add `uid` to a room. Joining twice is a no-op.
    pub async fn join(&self, uid: &str, room_id: &str) -> Result<(), DbError> {
        if self.get(room_id).await?.is_none() {
            return Err(DbError::RoomNotFound(room_id.to_string()));
        }
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO room_members (room_id, member, is_manager, joined_at)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(room_id)
        .bind(uid)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return DbError::UserNotFound(uid.to_string());
            }
            DbError::from(e)
        })?;
        Ok(())
    }

    /// Remove `uid` from a room. Returns whether it was a member.
    pub async fn out(&self, uid: &str, room_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND member = ?")
            .bind(room_id)
            .bind(uid)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, DbError};
    use chat_proto::{Room, User};

    async fn seeded() -> Database {
        let db = Database::new(":memory:").await.unwrap();
        for id in ["alice", "bob", "carol"] {
            db.users()
                .create(&User {
                    id: id.into(),
                    name: id.into(),
                })
                .await
                .unwrap();
        }
        db.rooms()
            .create(
                &Room {
                    id: "room1".into(),
                    name: "Room 1".into(),
                },
                "alice",
            )
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn owner_is_manager() {
        let db = seeded().await;
        db.rooms().join("bob", "room1").await.unwrap();

        let all = db.rooms().members("room1", false).await.unwrap();
        assert_eq!(all.len(), 2);
        let managers = db.rooms().members("room1", true).await.unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].id, "alice");
    }

    #[tokio::test]
    async fn join_unknown_room_fails() {
        let db = seeded().await;
        assert!(matches!(
            db.rooms().join("bob", "nope").await,
            Err(DbError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn join_is_idempotent_and_out_removes() {
        let db = seeded().await;
        db.rooms().join("carol", "room1").await.unwrap();
        db.rooms().join("carol", "room1").await.unwrap();
        assert_eq!(db.rooms().rooms_for("carol").await.unwrap().len(), 1);

        assert!(db.rooms().out("carol", "room1").await.unwrap());
        assert!(!db.rooms().out("carol", "room1").await.unwrap());
        assert!(db.rooms().rooms_for("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_room_rejected() {
        let db = seeded().await;
        let dup = Room {
            id: "room1".into(),
            name: "again".into(),
        };
        assert!(matches!(
            db.rooms().create(&dup, "bob").await,
            Err(DbError::RoomExists(_))
        ));
    }
}
