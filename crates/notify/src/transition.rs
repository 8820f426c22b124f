use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use trainhub_core::chain::ChainRole;
use trainhub_core::domain::notification::{EmailMessage, Notification, NotificationKind};
use trainhub_core::domain::request::{RequestStatus, StepOutcome, TrainingRequest};
use trainhub_core::domain::user::User;
use trainhub_core::workflow::{NotifyTarget, TransitionOutcome};

use crate::mailer::Mailer;

/// Users who can act on `role` and should be told the request reached them.
pub fn eligible_approvers(roster: &[User], role: ChainRole) -> Vec<&User> {
    roster
        .iter()
        .filter(|user| match role {
            ChainRole::Supervisor => {
                user.role == trainhub_core::domain::user::Role::Supervisor
                    || user.role.can_approve_any_level()
            }
            ChainRole::Administrator => user.role.can_approve_any_level(),
            ChainRole::Rank(rank) => {
                user.resolved_rank() == Some(rank) || user.role.can_approve_any_level()
            }
        })
        .collect()
}

fn requester_payload(
    request: &TrainingRequest,
    outcome: &TransitionOutcome,
) -> (String, String, NotificationKind) {
    let title = request.kind.title();
    match (outcome.to, outcome.stamp.outcome) {
        (RequestStatus::Approved, _) => (
            "Training Request Approved".to_string(),
            format!("Your training request \"{title}\" has been fully approved."),
            NotificationKind::Success,
        ),
        (RequestStatus::Denied, _) | (_, StepOutcome::Denied) => {
            let reason = outcome.denial_reason.as_deref().unwrap_or("No reason provided");
            (
                "Training Request Denied".to_string(),
                format!("Your training request \"{title}\" was denied. Reason: {reason}"),
                NotificationKind::Error,
            )
        }
        _ => (
            "Training Request Update".to_string(),
            format!(
                "Your training request \"{title}\" advanced to {}.",
                outcome.to.as_str().replace('_', " ")
            ),
            NotificationKind::Info,
        ),
    }
}

fn approver_payload(request: &TrainingRequest) -> (String, String, NotificationKind) {
    (
        "Training Request Awaiting Your Review".to_string(),
        format!(
            "Training request \"{}\" from {} (badge {}) is waiting for your review.",
            request.kind.title(),
            request.requester_name,
            request.requester_badge
        ),
        NotificationKind::Info,
    )
}

fn record(
    user: &User,
    request: &TrainingRequest,
    title: String,
    message: String,
    kind: NotificationKind,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        title,
        message,
        kind,
        read: false,
        link: Some(format!("/requests/{}", request.id.0)),
        created_at: now,
    }
}

fn email(user: &User, notification: &Notification) -> EmailMessage {
    EmailMessage {
        recipient_email: user.email.clone(),
        recipient_name: user.full_name(),
        subject: notification.title.clone(),
        body: notification.message.clone(),
    }
}

/// Builds the per-recipient payloads a committed transition owes. Pure;
/// recipients missing from the roster are silently skipped.
pub fn compose(
    request: &TrainingRequest,
    outcome: &TransitionOutcome,
    roster: &[User],
    now: DateTime<Utc>,
) -> Vec<(Notification, EmailMessage)> {
    let mut payloads = Vec::new();

    for target in &outcome.notifications {
        match target {
            NotifyTarget::Requester => {
                let Some(requester) =
                    roster.iter().find(|user| user.id == request.requester_id)
                else {
                    continue;
                };
                let (title, message, kind) = requester_payload(request, outcome);
                let note = record(requester, request, title, message, kind, now);
                let mail = email(requester, &note);
                payloads.push((note, mail));
            }
            NotifyTarget::Approvers(role) => {
                for approver in eligible_approvers(roster, *role) {
                    let (title, message, kind) = approver_payload(request);
                    let note = record(approver, request, title, message, kind, now);
                    let mail = email(approver, &note);
                    payloads.push((note, mail));
                }
            }
        }
    }

    payloads
}

/// Sends transition emails through the configured mailer. Failures are
/// logged and swallowed; the workflow write has already committed.
pub struct TransitionNotifier {
    mailer: Arc<dyn Mailer>,
}

impl TransitionNotifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Returns the in-app records for the caller to persist. Every email is
    /// attempted even when an earlier one fails.
    pub async fn dispatch(
        &self,
        request: &TrainingRequest,
        outcome: &TransitionOutcome,
        roster: &[User],
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        let payloads = compose(request, outcome, roster, now);
        let mut records = Vec::with_capacity(payloads.len());

        for (note, mail) in payloads {
            if let Err(err) = self.mailer.send(&mail).await {
                warn!(
                    request_id = %request.id.0,
                    recipient = %mail.recipient_email,
                    error = %err,
                    "transition email failed, continuing"
                );
            }
            records.push(note);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use trainhub_core::chain::{ChainRole, Rank};
    use trainhub_core::domain::notification::NotificationKind;
    use trainhub_core::domain::request::{
        RequestId, RequestKind, TrainingRequest, TrainingType,
    };
    use trainhub_core::domain::user::{Role, User, UserId};
    use trainhub_core::workflow::{apply_action, ApprovalAction, Actor};

    use super::{compose, eligible_approvers, TransitionNotifier};
    use crate::mailer::RecordingMailer;

    fn officer(id: &str, role: Role, rank: &str) -> User {
        User {
            id: UserId(id.to_string()),
            badge_number: format!("9{id}"),
            first_name: id.to_string(),
            last_name: "Example".to_string(),
            email: format!("{id}@pd.example"),
            role,
            department: "Patrol".to_string(),
            rank: rank.to_string(),
            supervisor_id: None,
            platoon: None,
        }
    }

    fn request() -> TrainingRequest {
        let now = Utc::now();
        TrainingRequest::submit(
            RequestId("TR-900".to_string()),
            UserId("req".to_string()),
            "req Example".to_string(),
            "9req".to_string(),
            RequestKind::Custom {
                title: "Field Training Officer School".to_string(),
                description: "FTO certification".to_string(),
                training_type: TrainingType::Individual,
                requested_date: now + Duration::days(45),
                duration: "40 hours".to_string(),
                location: "Academy".to_string(),
                estimated_cost: Decimal::new(90_000, 2),
                justification: "FTO staffing".to_string(),
            },
            Some(vec![Rank::Sergeant, Rank::Lieutenant]),
            now,
        )
    }

    fn roster() -> Vec<User> {
        vec![
            officer("req", Role::Officer, "Police Officer"),
            officer("sgt", Role::Supervisor, "Police Sergeant"),
            officer("lt", Role::Supervisor, "Police Lieutenant"),
            officer("admin", Role::Administrator, "Civilian"),
        ]
    }

    #[test]
    fn rank_steps_match_resolved_rank_and_admin_override() {
        let roster = roster();
        let reviewers = eligible_approvers(&roster, ChainRole::Rank(Rank::Lieutenant));
        let ids: Vec<&str> = reviewers.iter().map(|user| user.id.0.as_str()).collect();
        assert_eq!(ids, vec!["lt", "admin"]);
    }

    #[test]
    fn advancement_notifies_requester_and_next_reviewers() {
        let request = request();
        let roster = roster();
        let now = Utc::now();
        let actor = Actor {
            id: UserId("sgt".to_string()),
            name: "sgt Example".to_string(),
            role: Role::Supervisor,
            rank: Some(Rank::Sergeant),
        };
        let outcome =
            apply_action(&request, &ApprovalAction::Approve, &actor, now).expect("approve");

        let payloads = compose(&request, &outcome, &roster, now);
        let recipients: Vec<&str> =
            payloads.iter().map(|(note, _)| note.user_id.0.as_str()).collect();
        assert_eq!(recipients, vec!["req", "lt", "admin"]);
        assert_eq!(payloads[0].0.kind, NotificationKind::Info);
        assert!(payloads[1].0.title.contains("Awaiting Your Review"));
    }

    #[test]
    fn denial_notifies_only_the_requester_with_the_reason() {
        let request = request();
        let roster = roster();
        let now = Utc::now();
        let actor = Actor {
            id: UserId("sgt".to_string()),
            name: "sgt Example".to_string(),
            role: Role::Supervisor,
            rank: Some(Rank::Sergeant),
        };
        let outcome =
            apply_action(&request, &ApprovalAction::Deny { reason: None }, &actor, now)
                .expect("deny");

        let payloads = compose(&request, &outcome, &roster, now);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].0.kind, NotificationKind::Error);
        assert!(payloads[0].1.body.contains("No reason provided"));
    }

    #[tokio::test]
    async fn mailer_failure_does_not_drop_in_app_records() {
        let request = request();
        let roster = roster();
        let now = Utc::now();
        let actor = Actor {
            id: UserId("sgt".to_string()),
            name: "sgt Example".to_string(),
            role: Role::Supervisor,
            rank: Some(Rank::Sergeant),
        };
        let outcome =
            apply_action(&request, &ApprovalAction::Approve, &actor, now).expect("approve");

        let mailer = RecordingMailer::default();
        mailer.fail_next_sends(true);
        let notifier = TransitionNotifier::new(Arc::new(mailer.clone()));

        let records = notifier.dispatch(&request, &outcome, &roster, now).await;
        assert_eq!(records.len(), 3, "records survive relay outages");
        assert!(mailer.sent().is_empty());
    }
}
