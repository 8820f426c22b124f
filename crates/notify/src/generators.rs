//! Scheduled notification batches, generated from current state rather than
//! from workflow events.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use trainhub_core::chain::current_role;
use trainhub_core::domain::certificate::Certificate;
use trainhub_core::domain::notification::{Notification, NotificationKind};
use trainhub_core::domain::request::TrainingRequest;
use trainhub_core::domain::user::User;

use crate::transition::eligible_approvers;

pub const CERTIFICATE_WARNING_WINDOW_DAYS: i64 = 60;

/// Expiry warnings for active certificates inside the warning window.
/// Already-expired and revoked certificates are excluded.
pub fn certificate_expiry_warnings(
    certificates: &[Certificate],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    certificates
        .iter()
        .filter(|cert| cert.expires_within(now, CERTIFICATE_WARNING_WINDOW_DAYS))
        .map(|cert| {
            let days_left = cert
                .expires_at
                .map(|expires| expires.signed_duration_since(now).num_days())
                .unwrap_or(0);
            Notification {
                id: Uuid::new_v4().to_string(),
                user_id: cert.user_id.clone(),
                title: "Certificate Expiring Soon".to_string(),
                message: format!(
                    "Your certificate \"{}\" ({}) expires in {days_left} day(s).",
                    cert.training_title, cert.certificate_number
                ),
                kind: NotificationKind::Warning,
                read: false,
                link: Some(format!("/certificates/{}", cert.id)),
                created_at: now,
            }
        })
        .collect()
}

/// One digest entry per reviewer who has requests sitting at their step.
pub fn pending_approval_digests(
    requests: &[TrainingRequest],
    roster: &[User],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let mut digests = Vec::new();

    for user in roster {
        let waiting = requests
            .iter()
            .filter(|request| {
                !request.status.is_chain_terminal()
                    && current_role(&request.approval_chain, request.current_approval_level)
                        .map(|role| {
                            eligible_approvers(std::slice::from_ref(user), role).len() == 1
                        })
                        .unwrap_or(false)
            })
            .count();
        if waiting == 0 {
            continue;
        }

        digests.push(Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            title: "Pending Training Approvals".to_string(),
            message: format!("You have {waiting} training request(s) waiting for review."),
            kind: NotificationKind::Info,
            read: false,
            link: Some("/approvals".to_string()),
            created_at: now,
        });
    }

    digests
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use trainhub_core::chain::Rank;
    use trainhub_core::domain::certificate::{Certificate, CertificateStatus};
    use trainhub_core::domain::request::{
        RequestId, RequestKind, TrainingRequest, TrainingType,
    };
    use trainhub_core::domain::user::{Role, User, UserId};

    use super::{certificate_expiry_warnings, pending_approval_digests};

    #[test]
    fn warnings_cover_only_the_window() {
        let now = Utc::now();
        let cert = |id: &str, days: i64, status: CertificateStatus| Certificate {
            id: id.to_string(),
            user_id: UserId("u-1".to_string()),
            request_id: None,
            certificate_number: format!("CERT-{id}"),
            training_title: "Breathalyzer Operator".to_string(),
            completion_date: now - Duration::days(700),
            credits_earned: 4.0,
            instructor_name: "T. Alvarez".to_string(),
            issued_at: now - Duration::days(700),
            expires_at: Some(now + Duration::days(days)),
            status,
        };

        let warnings = certificate_expiry_warnings(
            &[
                cert("soon", 30, CertificateStatus::Active),
                cert("later", 120, CertificateStatus::Active),
                cert("revoked", 30, CertificateStatus::Revoked),
            ],
            now,
        );

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("CERT-soon"));
    }

    #[test]
    fn digest_counts_requests_at_the_reviewers_step() {
        let now = Utc::now();
        let sergeant = User {
            id: UserId("sgt".to_string()),
            badge_number: "2001".to_string(),
            first_name: "Ben".to_string(),
            last_name: "Ito".to_string(),
            email: "bito@pd.example".to_string(),
            role: Role::Supervisor,
            department: "Patrol".to_string(),
            rank: "Police Sergeant".to_string(),
            supervisor_id: None,
            platoon: None,
        };

        let request = |id: &str| {
            TrainingRequest::submit(
                RequestId(id.to_string()),
                UserId("u-1".to_string()),
                "Dana Reyes".to_string(),
                "4312".to_string(),
                RequestKind::Custom {
                    title: "Interview Techniques".to_string(),
                    description: "Two-day course".to_string(),
                    training_type: TrainingType::Individual,
                    requested_date: now + Duration::days(50),
                    duration: "16 hours".to_string(),
                    location: "HQ".to_string(),
                    estimated_cost: Decimal::new(30_000, 2),
                    justification: "Caseload".to_string(),
                },
                Some(vec![Rank::Sergeant]),
                now,
            )
        };

        let digests =
            pending_approval_digests(&[request("TR-1"), request("TR-2")], &[sergeant], now);
        assert_eq!(digests.len(), 1);
        assert!(digests[0].message.contains("2 training request(s)"));
    }
}
