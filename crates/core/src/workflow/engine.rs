use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::chain::{current_role, next_role, ChainRole};
use crate::domain::request::{RequestStatus, StepDecision, StepOutcome, TrainingRequest};
use crate::workflow::states::{Actor, ApprovalAction, NotifyTarget, TransitionOutcome};

pub const DEFAULT_DENIAL_REASON: &str = "No reason provided";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("actor `{actor}` is not authorized to act at level {level} (requires {required})")]
    Unauthorized { actor: String, level: usize, required: String },
    #[error("invalid state for transition ({status:?}): {detail}")]
    InvalidState { status: RequestStatus, detail: String },
    #[error("validation failed: {message}")]
    Validation { message: String },
}

/// Evaluates approve/deny actions against the approval chain.
///
/// Pure with respect to the request: it returns the patch to persist and the
/// notification fan-out, and fails closed before proposing any mutation.
#[derive(Clone, Debug, Default)]
pub struct ApprovalEngine;

impl ApprovalEngine {
    pub fn apply(
        &self,
        request: &TrainingRequest,
        action: &ApprovalAction,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        apply_action(request, action, actor, now)
    }
}

/// Whether `actor` may decide a step guarded by `role`.
/// Administrators and training coordinators may act at any level.
pub fn is_authorized(actor: &Actor, role: ChainRole) -> bool {
    if actor.role.can_approve_any_level() {
        return true;
    }
    match role {
        ChainRole::Supervisor => actor.role == crate::domain::user::Role::Supervisor,
        ChainRole::Administrator => false,
        ChainRole::Rank(rank) => actor.rank == Some(rank),
    }
}

pub fn apply_action(
    request: &TrainingRequest,
    action: &ApprovalAction,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, WorkflowError> {
    if request.approval_chain.is_empty() {
        return Err(WorkflowError::InvalidState {
            status: request.status,
            detail: "request has no approval chain".to_string(),
        });
    }
    if request.status.is_chain_terminal() {
        return Err(WorkflowError::InvalidState {
            status: request.status,
            detail: "request already reached a terminal status".to_string(),
        });
    }

    let level = request.current_approval_level;
    let Some(role) = current_role(&request.approval_chain, level) else {
        return Err(WorkflowError::InvalidState {
            status: request.status,
            detail: format!(
                "approval level {level} is out of bounds for a {}-step chain",
                request.approval_chain.len()
            ),
        });
    };

    if !is_authorized(actor, role) {
        return Err(WorkflowError::Unauthorized {
            actor: actor.id.0.clone(),
            level,
            required: role.label().to_string(),
        });
    }

    // One audit tuple per step; a decided step is never re-stamped.
    if request.steps.get(level).is_some_and(|step| step.decision.is_some()) {
        return Err(WorkflowError::InvalidState {
            status: request.status,
            detail: format!("step {level} has already been decided"),
        });
    }

    let outcome = match action {
        ApprovalAction::Approve => {
            let next = next_role(&request.approval_chain, level);
            let to = match next {
                Some(role) => role.review_status(),
                None => RequestStatus::Approved,
            };
            let mut notifications = vec![NotifyTarget::Requester];
            if let Some(next) = next {
                notifications.push(NotifyTarget::Approvers(next));
            }
            TransitionOutcome {
                from: request.status,
                to,
                previous_level: level,
                new_level: level + 1,
                stamped_level: level,
                stamp: StepDecision {
                    approver_id: actor.id.clone(),
                    approver_name: actor.name.clone(),
                    decided_at: now,
                    notes: None,
                    outcome: StepOutcome::Approved,
                },
                denial_reason: None,
                notifications,
            }
        }
        ApprovalAction::Deny { reason } => {
            let reason = reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_DENIAL_REASON)
                .to_string();
            TransitionOutcome {
                from: request.status,
                to: RequestStatus::Denied,
                previous_level: level,
                new_level: level,
                stamped_level: level,
                stamp: StepDecision {
                    approver_id: actor.id.clone(),
                    approver_name: actor.name.clone(),
                    decided_at: now,
                    notes: Some(reason.clone()),
                    outcome: StepOutcome::Denied,
                },
                denial_reason: Some(reason),
                notifications: vec![NotifyTarget::Requester],
            }
        }
    };

    Ok(outcome)
}

/// Applies a computed outcome to an owned request, producing the persisted
/// shape. Used by the in-memory repository and by tests; the SQL repository
/// applies the same patch inside its conditional update.
pub fn apply_outcome(
    request: &mut TrainingRequest,
    outcome: &TransitionOutcome,
    now: DateTime<Utc>,
) {
    request.status = outcome.to;
    request.current_approval_level = outcome.new_level;
    if let Some(step) = request.steps.get_mut(outcome.stamped_level) {
        step.decision = Some(outcome.stamp.clone());
    }
    if outcome.denial_reason.is_some() {
        request.denial_reason = outcome.denial_reason.clone();
    }
    request.version += 1;
    request.updated_at = now;
}

/// Out-of-band scheduling action. Not part of the chain: only a fully
/// approved request can be scheduled.
pub fn schedule(
    request: &TrainingRequest,
    when: DateTime<Utc>,
) -> Result<(RequestStatus, DateTime<Utc>), WorkflowError> {
    if request.status != RequestStatus::Approved {
        return Err(WorkflowError::InvalidState {
            status: request.status,
            detail: "only approved requests can be scheduled".to_string(),
        });
    }
    Ok((RequestStatus::Scheduled, when))
}

/// Marks attendance complete for a scheduled (or directly approved) request.
pub fn complete(request: &TrainingRequest) -> Result<RequestStatus, WorkflowError> {
    match request.status {
        RequestStatus::Scheduled | RequestStatus::Approved => Ok(RequestStatus::Completed),
        status => Err(WorkflowError::InvalidState {
            status,
            detail: "only scheduled or approved requests can be completed".to_string(),
        }),
    }
}
