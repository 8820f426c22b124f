use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use trainhub_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use trainhub_core::domain::request::RequestId;

use super::{AuditEventRepository, RepositoryError};
use crate::DbPool;

/// Append-only store for workflow audit events. Events are never updated.
pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id: String = row.try_get("event_id").map_err(decode_err)?;
    let request_id: Option<String> = row.try_get("request_id").map_err(decode_err)?;
    let correlation_id: String = row.try_get("correlation_id").map_err(decode_err)?;
    let event_type: String = row.try_get("event_type").map_err(decode_err)?;
    let category_str: String = row.try_get("category").map_err(decode_err)?;
    let actor: String = row.try_get("actor").map_err(decode_err)?;
    let outcome_str: String = row.try_get("outcome").map_err(decode_err)?;
    let metadata_json: String = row.try_get("metadata").map_err(decode_err)?;
    let occurred_at_str: String = row.try_get("occurred_at").map_err(decode_err)?;

    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_json).map_err(decode_err)?;

    Ok(AuditEvent {
        event_id,
        request_id: request_id.map(RequestId),
        correlation_id,
        event_type,
        category: AuditCategory::parse(&category_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown category `{category_str}`")))?,
        actor,
        outcome: AuditOutcome::parse(&outcome_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown outcome `{outcome_str}`")))?,
        metadata,
        occurred_at: DateTime::parse_from_rfc3339(&occurred_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_err)?,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&event.metadata).map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO audit_event
                 (event_id, request_id, correlation_id, event_type, category,
                  actor, outcome, metadata, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.request_id.as_ref().map(|id| id.0.clone()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(event.outcome.as_str())
        .bind(&metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT event_id, request_id, correlation_id, event_type, category,
                    actor, outcome, metadata, occurred_at
             FROM audit_event WHERE request_id = ? ORDER BY occurred_at",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use trainhub_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
    use trainhub_core::domain::request::RequestId;

    use super::SqlAuditEventRepository;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::AuditEventRepository;

    #[tokio::test]
    async fn appended_events_come_back_in_order_with_metadata() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        let repo = SqlAuditEventRepository::new(pool);

        let request_id = RequestId("TR-100".to_string());
        let event = AuditEvent::new(
            Some(request_id.clone()),
            "corr-1",
            "workflow.transition_applied",
            AuditCategory::Workflow,
            "Ben Ito",
            AuditOutcome::Success,
        )
        .with_metadata("from", "sergeant_review")
        .with_metadata("to", "lieutenant_review");

        repo.append(event).await.expect("append");

        let listed = repo.list_for_request(&request_id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_type, "workflow.transition_applied");
        assert_eq!(listed[0].metadata.get("to").map(String::as_str), Some("lieutenant_review"));
    }
}
