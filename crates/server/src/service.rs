//! Orchestration between the workflow engine and persistence. The write
//! order is fixed: evaluate, commit under compare-and-swap, audit, then
//! notify. Notification failures never surface to the caller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use trainhub_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use trainhub_core::domain::request::{RequestId, RequestKind, RequestStatus, TrainingRequest};
use trainhub_core::domain::user::UserId;
use trainhub_core::chain::Rank;
use trainhub_core::errors::ApplicationError;
use trainhub_core::workflow::{
    apply_outcome, complete, schedule, ApprovalAction, ApprovalEngine, Actor,
};
use trainhub_db::repositories::{
    AuditEventRepository, NotificationRepository, RepositoryError, RequestRepository,
    UserRepository,
};
use trainhub_notify::TransitionNotifier;

pub struct ApprovalService {
    requests: Arc<dyn RequestRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
    audit: Arc<dyn AuditEventRepository>,
    notifier: TransitionNotifier,
    engine: ApprovalEngine,
}

fn persistence(err: RepositoryError) -> ApplicationError {
    match err {
        RepositoryError::Conflict(message) => ApplicationError::Conflict(message),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

impl ApprovalService {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
        audit: Arc<dyn AuditEventRepository>,
        notifier: TransitionNotifier,
    ) -> Self {
        Self { requests, users, notifications, audit, notifier, engine: ApprovalEngine }
    }

    pub async fn submit(
        &self,
        requester_id: UserId,
        kind: RequestKind,
        custom_chain: Option<Vec<Rank>>,
        correlation_id: &str,
    ) -> Result<TrainingRequest, ApplicationError> {
        let requester = self
            .users
            .find_by_id(&requester_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("unknown requester {}", requester_id.0))
            })?;

        let now = Utc::now();
        let request = TrainingRequest::submit(
            RequestId(format!("TR-{}", Uuid::new_v4())),
            requester.id.clone(),
            requester.full_name(),
            requester.badge_number.clone(),
            kind,
            custom_chain,
            now,
        );
        self.requests.save(request.clone()).await.map_err(persistence)?;

        let event = AuditEvent::new(
            Some(request.id.clone()),
            correlation_id,
            "workflow.request_submitted",
            AuditCategory::Workflow,
            requester.full_name(),
            AuditOutcome::Success,
        )
        .with_metadata("status", request.status.as_str())
        .with_metadata("kind", request.kind.label());
        self.record_audit(event).await;

        info!(
            event_name = "workflow.request_submitted",
            correlation_id,
            request_id = %request.id.0,
            status = request.status.as_str(),
            "training request submitted"
        );
        Ok(request)
    }

    /// Applies an approve/deny action for `actor_id` on `request_id`.
    /// A CAS conflict from the repository surfaces as `Conflict`; the caller
    /// reloads and retries with fresh state.
    pub async fn decide(
        &self,
        request_id: &RequestId,
        actor_id: &UserId,
        action: ApprovalAction,
        correlation_id: &str,
    ) -> Result<TrainingRequest, ApplicationError> {
        let request = self.load(request_id).await?;
        let user = self
            .users
            .find_by_id(actor_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("unknown actor {}", actor_id.0)))?;
        let actor = Actor::from_user(&user);

        let now = Utc::now();
        let outcome = match self.engine.apply(&request, &action, &actor, now) {
            Ok(outcome) => outcome,
            Err(error) => {
                let event = AuditEvent::new(
                    Some(request.id.clone()),
                    correlation_id,
                    "workflow.transition_rejected",
                    AuditCategory::Workflow,
                    actor.name.clone(),
                    AuditOutcome::Rejected,
                )
                .with_metadata("status", request.status.as_str())
                .with_metadata("error", error.to_string());
                self.record_audit(event).await;
                return Err(error.into());
            }
        };

        let mut updated = request.clone();
        apply_outcome(&mut updated, &outcome, now);
        self.requests.apply_transition(&updated, &outcome).await.map_err(persistence)?;

        let event = AuditEvent::new(
            Some(updated.id.clone()),
            correlation_id,
            "workflow.transition_applied",
            AuditCategory::Workflow,
            actor.name.clone(),
            AuditOutcome::Success,
        )
        .with_metadata("from", outcome.from.as_str())
        .with_metadata("to", outcome.to.as_str())
        .with_metadata("stamped_level", outcome.stamped_level.to_string());
        self.record_audit(event).await;

        // Fan-out happens only after the write above has committed.
        let roster = match self.users.list().await {
            Ok(roster) => roster,
            Err(error) => {
                warn!(
                    correlation_id,
                    request_id = %updated.id.0,
                    error = %error,
                    "roster load failed, skipping notifications"
                );
                Vec::new()
            }
        };
        for record in self.notifier.dispatch(&updated, &outcome, &roster, now).await {
            if let Err(error) = self.notifications.save(record).await {
                warn!(
                    correlation_id,
                    request_id = %updated.id.0,
                    error = %error,
                    "in-app notification write failed, continuing"
                );
            }
        }

        info!(
            event_name = "workflow.transition_applied",
            correlation_id,
            request_id = %updated.id.0,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            "transition committed"
        );
        Ok(updated)
    }

    pub async fn schedule(
        &self,
        request_id: &RequestId,
        when: chrono::DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<TrainingRequest, ApplicationError> {
        let mut request = self.load(request_id).await?;
        let (status, scheduled_for) = schedule(&request, when)?;
        request.status = status;
        request.scheduled_for = Some(scheduled_for);
        request.version += 1;
        request.updated_at = Utc::now();
        self.requests.save_guarded(request.clone()).await.map_err(persistence)?;

        info!(
            event_name = "workflow.request_scheduled",
            correlation_id,
            request_id = %request.id.0,
            "request scheduled"
        );
        Ok(request)
    }

    pub async fn complete(
        &self,
        request_id: &RequestId,
        cpt_hours: Option<f64>,
        correlation_id: &str,
    ) -> Result<TrainingRequest, ApplicationError> {
        let mut request = self.load(request_id).await?;
        request.status = complete(&request)?;
        request.cpt_hours = cpt_hours.or(request.cpt_hours);
        request.version += 1;
        request.updated_at = Utc::now();
        self.requests.save_guarded(request.clone()).await.map_err(persistence)?;

        info!(
            event_name = "workflow.request_completed",
            correlation_id,
            request_id = %request.id.0,
            "request completed"
        );
        Ok(request)
    }

    pub async fn find(&self, request_id: &RequestId) -> Result<TrainingRequest, ApplicationError> {
        self.load(request_id).await
    }

    pub async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<TrainingRequest>, ApplicationError> {
        self.requests.list_by_status(status).await.map_err(persistence)
    }

    async fn load(&self, request_id: &RequestId) -> Result<TrainingRequest, ApplicationError> {
        self.requests
            .find_by_id(request_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("request {} not found", request_id.0)))
    }

    async fn record_audit(&self, event: AuditEvent) {
        if let Err(error) = self.audit.append(event).await {
            warn!(error = %error, "audit write failed, continuing");
        }
    }
}
