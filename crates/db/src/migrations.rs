use std::collections::HashSet;

use sqlx::migrate::{MigrateError, MigrationType, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies pending migrations and returns the names of the ones that ran,
/// in version order. An up-to-date schema yields an empty list.
pub async fn run_pending(pool: &DbPool) -> Result<Vec<String>, MigrateError> {
    let already_applied = applied_versions(pool).await?;
    MIGRATOR.run(pool).await?;

    Ok(MIGRATOR
        .iter()
        .filter(|migration| {
            !matches!(migration.migration_type, MigrationType::ReversibleDown)
                && !already_applied.contains(&migration.version)
        })
        .map(|migration| format!("{:04} {}", migration.version, migration.description))
        .collect())
}

async fn applied_versions(pool: &DbPool) -> Result<HashSet<i64>, MigrateError> {
    let has_ledger: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if has_ledger == 0 {
        return Ok(HashSet::new());
    }

    let versions: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations").fetch_all(pool).await?;
    Ok(versions.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &[
        "users",
        "training_requests",
        "request_steps",
        "cost_entries",
        "invoices",
        "certificates",
        "notifications",
        "audit_event",
    ];

    async fn table_exists(pool: &sqlx::SqlitePool, name: &str) -> bool {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("check table")
            .get::<i64, _>("count")
            == 1
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            assert!(table_exists(&pool, table).await, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn run_pending_reports_each_migration_exactly_once() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let first = run_pending(&pool).await.expect("run migrations");
        assert_eq!(first.len(), 1);
        assert!(first[0].contains("initial schema"), "unexpected name: {}", first[0]);

        let second = run_pending(&pool).await.expect("second run");
        assert!(second.is_empty(), "an up-to-date schema must report nothing");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for table in MANAGED_TABLES {
            assert!(!table_exists(&pool, table).await, "table {table} should be dropped");
        }
    }

    #[tokio::test]
    async fn request_steps_reject_duplicate_step_index() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO training_requests
                 (id, requester_id, requester_name, requester_badge, kind, status,
                  approval_chain, current_approval_level, version, created_at, updated_at)
             VALUES ('r-1', 'u-1', 'Ada Vance', '1001', '{}', 'submitted', '[]', 0, 1,
                     '2026-03-01T00:00:00Z', '2026-03-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert request");

        let insert_step = "INSERT INTO request_steps
             (request_id, step_index, role, approver_id, approver_name, outcome, notes, decided_at)
             VALUES ('r-1', 0, 'sergeant', 'u-2', 'Ben Ito', 'approved', NULL, '2026-03-02T00:00:00Z')";

        sqlx::query(insert_step).execute(&pool).await.expect("first stamp");
        let duplicate = sqlx::query(insert_step).execute(&pool).await;
        assert!(duplicate.is_err(), "duplicate stamp for the same step must be rejected");
    }
}
