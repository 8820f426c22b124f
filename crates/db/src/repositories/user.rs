use sqlx::Row;

use trainhub_core::domain::user::{Platoon, Role, User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let badge_number: String =
        row.try_get("badge_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let first_name: String =
        row.try_get("first_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_name: String =
        row.try_get("last_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String = row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let department: String =
        row.try_get("department").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rank: String = row.try_get("rank").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supervisor_id: Option<String> =
        row.try_get("supervisor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let platoon_str: Option<String> =
        row.try_get("platoon").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(User {
        id: UserId(id),
        badge_number,
        first_name,
        last_name,
        email,
        role: Role::parse(&role_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?,
        department,
        rank,
        supervisor_id: supervisor_id.map(UserId),
        platoon: platoon_str.as_deref().and_then(Platoon::parse),
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, badge_number, first_name, last_name, email, role, department,
                    rank, supervisor_id, platoon
             FROM users WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, badge_number, first_name, last_name, email, role, department,
                    rank, supervisor_id, platoon
             FROM users ORDER BY last_name, first_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, badge_number, first_name, last_name, email, role,
                                department, rank, supervisor_id, platoon)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 badge_number = excluded.badge_number,
                 first_name = excluded.first_name,
                 last_name = excluded.last_name,
                 email = excluded.email,
                 role = excluded.role,
                 department = excluded.department,
                 rank = excluded.rank,
                 supervisor_id = excluded.supervisor_id,
                 platoon = excluded.platoon",
        )
        .bind(&user.id.0)
        .bind(&user.badge_number)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.department)
        .bind(&user.rank)
        .bind(user.supervisor_id.as_ref().map(|id| id.0.clone()))
        .bind(user.platoon.map(|p| p.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
