use chrono::{DateTime, Utc};
use sqlx::Row;

use trainhub_core::domain::notification::{Notification, NotificationKind};
use trainhub_core::domain::user::UserId;

use super::{NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let title: String = row.try_get("title").map_err(decode_err)?;
    let message: String = row.try_get("message").map_err(decode_err)?;
    let kind_str: String = row.try_get("kind").map_err(decode_err)?;
    let read: i64 = row.try_get("read").map_err(decode_err)?;
    let link: Option<String> = row.try_get("link").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Notification {
        id,
        user_id: UserId(user_id),
        title,
        message,
        kind: NotificationKind::parse(&kind_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown kind `{kind_str}`")))?,
        read: read != 0,
        link,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_err)?,
    })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, message, kind, read, link, created_at
             FROM notifications WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, kind, read, link, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET read = excluded.read",
        )
        .bind(&notification.id)
        .bind(&notification.user_id.0)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(i64::from(notification.read))
        .bind(&notification.link)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_read(&self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
