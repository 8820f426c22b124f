use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use trainhub_core::chain::ChainRole;
use trainhub_core::domain::request::{
    ApprovalStep, RequestId, RequestKind, RequestStatus, StepDecision, StepOutcome,
    TrainingRequest,
};
use trainhub_core::domain::user::UserId;
use trainhub_core::workflow::TransitionOutcome;

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_steps(
        &self,
        request_id: &str,
    ) -> Result<HashMap<usize, StepDecision>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT step_index, approver_id, approver_name, outcome, notes, decided_at
             FROM request_steps WHERE request_id = ? ORDER BY step_index",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        let mut decisions = HashMap::new();
        for row in rows {
            let step_index: i64 =
                row.try_get("step_index").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            decisions.insert(step_index as usize, row_to_decision(&row)?);
        }
        Ok(decisions)
    }

    async fn assemble(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<TrainingRequest, RepositoryError> {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let decisions = self.load_steps(&id).await?;
        row_to_request(row, decisions)
    }
}

fn decode_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn chain_to_json(chain: &[ChainRole]) -> Result<String, RepositoryError> {
    let labels: Vec<&str> = chain.iter().map(ChainRole::label).collect();
    serde_json::to_string(&labels).map_err(decode_err)
}

fn chain_from_json(raw: &str) -> Result<Vec<ChainRole>, RepositoryError> {
    let labels: Vec<String> = serde_json::from_str(raw).map_err(decode_err)?;
    labels
        .iter()
        .map(|label| {
            ChainRole::parse(label)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown chain role `{label}`")))
        })
        .collect()
}

fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Result<StepDecision, RepositoryError> {
    let approver_id: String = row.try_get("approver_id").map_err(decode_err)?;
    let approver_name: String = row.try_get("approver_name").map_err(decode_err)?;
    let outcome_str: String = row.try_get("outcome").map_err(decode_err)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode_err)?;
    let decided_at_str: String = row.try_get("decided_at").map_err(decode_err)?;

    Ok(StepDecision {
        approver_id: UserId(approver_id),
        approver_name,
        decided_at: parse_datetime(&decided_at_str)?,
        notes,
        outcome: StepOutcome::parse(&outcome_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown outcome `{outcome_str}`")))?,
    })
}

fn row_to_request(
    row: &sqlx::sqlite::SqliteRow,
    decisions: HashMap<usize, StepDecision>,
) -> Result<TrainingRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let requester_id: String = row.try_get("requester_id").map_err(decode_err)?;
    let requester_name: String = row.try_get("requester_name").map_err(decode_err)?;
    let requester_badge: String = row.try_get("requester_badge").map_err(decode_err)?;
    let kind_json: String = row.try_get("kind").map_err(decode_err)?;
    let status_str: String = row.try_get("status").map_err(decode_err)?;
    let chain_json: String = row.try_get("approval_chain").map_err(decode_err)?;
    let current_approval_level: i64 =
        row.try_get("current_approval_level").map_err(decode_err)?;
    let denial_reason: Option<String> = row.try_get("denial_reason").map_err(decode_err)?;
    let submitted_at_str: Option<String> = row.try_get("submitted_at").map_err(decode_err)?;
    let scheduled_for_str: Option<String> = row.try_get("scheduled_for").map_err(decode_err)?;
    let submitted_within_30_days: Option<i64> =
        row.try_get("submitted_within_30_days").map_err(decode_err)?;
    let cpt_hours: Option<f64> = row.try_get("cpt_hours").map_err(decode_err)?;
    let version: i64 = row.try_get("version").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode_err)?;

    let kind: RequestKind = serde_json::from_str(&kind_json).map_err(decode_err)?;
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_str}`")))?;
    let approval_chain = chain_from_json(&chain_json)?;

    let mut decisions = decisions;
    let steps: Vec<ApprovalStep> = approval_chain
        .iter()
        .enumerate()
        .map(|(index, role)| ApprovalStep { role: *role, decision: decisions.remove(&index) })
        .collect();

    let created_at = parse_datetime(&created_at_str)?;

    Ok(TrainingRequest {
        id: RequestId(id),
        requester_id: UserId(requester_id),
        requester_name,
        requester_badge,
        kind,
        status,
        approval_chain,
        current_approval_level: current_approval_level as usize,
        steps,
        denial_reason,
        submitted_at: match submitted_at_str {
            Some(raw) => parse_datetime(&raw)?,
            None => created_at,
        },
        scheduled_for: match scheduled_for_str {
            Some(raw) => Some(parse_datetime(&raw)?),
            None => None,
        },
        submitted_within_30_days: submitted_within_30_days.map(|flag| flag != 0),
        cpt_hours,
        version,
        created_at,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

const SELECT_COLUMNS: &str = "SELECT id, requester_id, requester_name, requester_badge, kind,
            status, approval_chain, current_approval_level, denial_reason, submitted_at,
            scheduled_for, submitted_within_30_days, cpt_hours, version, created_at, updated_at
     FROM training_requests";

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<TrainingRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(self.assemble(r).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<TrainingRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status = ? ORDER BY created_at DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            requests.push(self.assemble(row).await?);
        }
        Ok(requests)
    }

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<TrainingRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE requester_id = ? ORDER BY created_at DESC"
        ))
        .bind(&requester_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            requests.push(self.assemble(row).await?);
        }
        Ok(requests)
    }

    async fn save(&self, request: TrainingRequest) -> Result<(), RepositoryError> {
        let kind_json = serde_json::to_string(&request.kind).map_err(decode_err)?;
        let chain_json = chain_to_json(&request.approval_chain)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO training_requests
                 (id, requester_id, requester_name, requester_badge, kind, status,
                  approval_chain, current_approval_level, denial_reason, submitted_at,
                  scheduled_for, submitted_within_30_days, cpt_hours, version,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 current_approval_level = excluded.current_approval_level,
                 denial_reason = excluded.denial_reason,
                 scheduled_for = excluded.scheduled_for,
                 cpt_hours = excluded.cpt_hours,
                 version = excluded.version,
                 updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.requester_id.0)
        .bind(&request.requester_name)
        .bind(&request.requester_badge)
        .bind(&kind_json)
        .bind(request.status.as_str())
        .bind(&chain_json)
        .bind(request.current_approval_level as i64)
        .bind(&request.denial_reason)
        .bind(request.submitted_at.to_rfc3339())
        .bind(request.scheduled_for.map(|dt| dt.to_rfc3339()))
        .bind(request.submitted_within_30_days.map(i64::from))
        .bind(request.cpt_hours)
        .bind(request.version)
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (index, step) in request.steps.iter().enumerate() {
            let Some(decision) = &step.decision else { continue };
            sqlx::query(
                "INSERT INTO request_steps
                     (request_id, step_index, role, approver_id, approver_name,
                      outcome, notes, decided_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(request_id, step_index) DO NOTHING",
            )
            .bind(&request.id.0)
            .bind(index as i64)
            .bind(step.role.label())
            .bind(&decision.approver_id.0)
            .bind(&decision.approver_name)
            .bind(decision.outcome.as_str())
            .bind(&decision.notes)
            .bind(decision.decided_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_guarded(&self, request: TrainingRequest) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE training_requests
             SET status = ?, scheduled_for = ?, cpt_hours = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(request.status.as_str())
        .bind(request.scheduled_for.map(|dt| dt.to_rfc3339()))
        .bind(request.cpt_hours)
        .bind(request.version)
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id.0)
        .bind(request.version - 1)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "request {} changed underneath this update",
                request.id.0
            )));
        }
        Ok(())
    }

    async fn apply_transition(
        &self,
        updated: &TrainingRequest,
        outcome: &TransitionOutcome,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE training_requests
             SET status = ?, current_approval_level = ?, denial_reason = ?,
                 version = ?, updated_at = ?
             WHERE id = ? AND status = ? AND current_approval_level = ? AND version = ?",
        )
        .bind(updated.status.as_str())
        .bind(updated.current_approval_level as i64)
        .bind(&updated.denial_reason)
        .bind(updated.version)
        .bind(updated.updated_at.to_rfc3339())
        .bind(&updated.id.0)
        .bind(outcome.from.as_str())
        .bind(outcome.previous_level as i64)
        .bind(updated.version - 1)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "request {} changed underneath this transition",
                updated.id.0
            )));
        }

        let role = updated
            .approval_chain
            .get(outcome.stamped_level)
            .map(ChainRole::label)
            .ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "stamped level {} is outside the chain",
                    outcome.stamped_level
                ))
            })?;

        let stamped = sqlx::query(
            "INSERT INTO request_steps
                 (request_id, step_index, role, approver_id, approver_name,
                  outcome, notes, decided_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&updated.id.0)
        .bind(outcome.stamped_level as i64)
        .bind(role)
        .bind(&outcome.stamp.approver_id.0)
        .bind(&outcome.stamp.approver_name)
        .bind(outcome.stamp.outcome.as_str())
        .bind(&outcome.stamp.notes)
        .bind(outcome.stamp.decided_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match stamped {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(RepositoryError::Conflict(format!(
                    "step {} of request {} was already decided",
                    outcome.stamped_level, updated.id.0
                )));
            }
            Err(other) => return Err(other.into()),
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use trainhub_core::chain::Rank;
    use trainhub_core::domain::request::{
        RequestId, RequestKind, RequestStatus, TrainingRequest, TrainingType,
    };
    use trainhub_core::domain::user::{Role, UserId};
    use trainhub_core::workflow::{apply_outcome, ApprovalAction, ApprovalEngine, Actor};

    use super::SqlRequestRepository;
    use crate::migrations::run_pending;
    use crate::repositories::{RepositoryError, RequestRepository};
    use crate::connect_with_settings;

    async fn repo() -> SqlRequestRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlRequestRepository::new(pool)
    }

    fn submitted_request() -> TrainingRequest {
        let now = Utc::now();
        TrainingRequest::submit(
            RequestId("TR-100".to_string()),
            UserId("u-1".to_string()),
            "Dana Reyes".to_string(),
            "4312".to_string(),
            RequestKind::Custom {
                title: "Crisis Negotiation".to_string(),
                description: "Advanced track".to_string(),
                training_type: TrainingType::Individual,
                requested_date: now + Duration::days(60),
                duration: "24 hours".to_string(),
                location: "Academy".to_string(),
                estimated_cost: Decimal::new(80_000, 2),
                justification: "Unit readiness".to_string(),
            },
            Some(vec![Rank::Sergeant, Rank::Lieutenant]),
            now,
        )
    }

    fn sergeant() -> Actor {
        Actor {
            id: UserId("u-sgt".to_string()),
            name: "Ben Ito".to_string(),
            role: Role::Supervisor,
            rank: Some(Rank::Sergeant),
        }
    }

    #[tokio::test]
    async fn save_and_reload_round_trips_chain_and_kind() {
        let repo = repo().await;
        let request = submitted_request();
        repo.save(request.clone()).await.expect("save");

        let loaded = repo
            .find_by_id(&request.id)
            .await
            .expect("find")
            .expect("request should exist");

        assert_eq!(loaded.status, RequestStatus::SergeantReview);
        assert_eq!(loaded.approval_chain, request.approval_chain);
        assert_eq!(loaded.kind, request.kind);
        assert_eq!(loaded.steps.len(), 2);
        assert!(loaded.steps.iter().all(|step| step.decision.is_none()));
    }

    #[tokio::test]
    async fn transition_write_persists_the_stamp_and_new_status() {
        let repo = repo().await;
        let mut request = submitted_request();
        repo.save(request.clone()).await.expect("save");

        let now = Utc::now();
        let outcome = ApprovalEngine
            .apply(&request, &ApprovalAction::Approve, &sergeant(), now)
            .expect("approve");
        apply_outcome(&mut request, &outcome, now);

        repo.apply_transition(&request, &outcome).await.expect("transition");

        let loaded = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        assert_eq!(loaded.status, RequestStatus::LieutenantReview);
        assert_eq!(loaded.current_approval_level, 1);
        assert_eq!(loaded.version, 2);
        let stamp = loaded.steps[0].decision.as_ref().expect("stamp recorded");
        assert_eq!(stamp.approver_name, "Ben Ito");
        assert!(loaded.steps[1].decision.is_none());
    }

    #[tokio::test]
    async fn stale_out_of_band_update_is_rejected() {
        let repo = repo().await;
        let stored = submitted_request();
        repo.save(stored.clone()).await.expect("save");

        let mut first = stored.clone();
        first.status = RequestStatus::Scheduled;
        first.scheduled_for = Some(Utc::now() + Duration::days(30));
        first.version += 1;
        repo.save_guarded(first).await.expect("first guarded write");

        // A second writer computed its update from the same snapshot.
        let mut second = stored.clone();
        second.status = RequestStatus::Scheduled;
        second.scheduled_for = Some(Utc::now() + Duration::days(45));
        second.version += 1;
        let error = repo.save_guarded(second).await.expect_err("stale update must fail");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let loaded = repo.find_by_id(&stored.id).await.expect("find").expect("exists");
        assert_eq!(loaded.version, 2, "losing writer must not bump the version");
    }

    #[tokio::test]
    async fn stale_transition_is_rejected_without_writing() {
        let repo = repo().await;
        let stored = submitted_request();
        repo.save(stored.clone()).await.expect("save");

        let now = Utc::now();
        let outcome = ApprovalEngine
            .apply(&stored, &ApprovalAction::Approve, &sergeant(), now)
            .expect("approve");
        let mut first = stored.clone();
        apply_outcome(&mut first, &outcome, now);
        repo.apply_transition(&first, &outcome).await.expect("first transition");

        // A second writer raced on the same snapshot.
        let mut second = stored.clone();
        apply_outcome(&mut second, &outcome, now);
        let error = repo
            .apply_transition(&second, &outcome)
            .await
            .expect_err("stale write must fail");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let loaded = repo.find_by_id(&stored.id).await.expect("find").expect("exists");
        assert_eq!(loaded.version, 2, "losing writer must not bump the version");
    }
}
