//! Scheduled notification jobs. The scan is pure in trainhub-notify; this
//! module only loads inputs, persists the results, and keeps the schedule.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use trainhub_core::domain::notification::{Notification, NotificationKind};
use trainhub_core::domain::request::RequestStatus;
use trainhub_core::domain::user::UserId;
use trainhub_db::repositories::{
    CertificateRepository, NotificationRepository, RepositoryError, RequestRepository,
    UserRepository,
};
use trainhub_notify::{certificate_expiry_warnings, pending_approval_digests};

const REVIEW_STATUSES: [RequestStatus; 7] = [
    RequestStatus::Submitted,
    RequestStatus::SupervisorReview,
    RequestStatus::AdminApproval,
    RequestStatus::SergeantReview,
    RequestStatus::LieutenantReview,
    RequestStatus::CommanderReview,
    RequestStatus::ChiefApproval,
];

/// How long before the same notice may be re-issued to the same recipient.
const WARNING_REPEAT_DAYS: i64 = 7;
const DIGEST_REPEAT_DAYS: i64 = 1;

fn repeat_window(kind: NotificationKind) -> chrono::Duration {
    match kind {
        NotificationKind::Warning | NotificationKind::Error => {
            chrono::Duration::days(WARNING_REPEAT_DAYS)
        }
        _ => chrono::Duration::days(DIGEST_REPEAT_DAYS),
    }
}

fn recently_delivered(
    history: &[Notification],
    record: &Notification,
    now: DateTime<Utc>,
) -> bool {
    history.iter().any(|prior| {
        prior.title == record.title
            && prior.link == record.link
            && now.signed_duration_since(prior.created_at) < repeat_window(record.kind)
    })
}

pub struct DigestJob {
    certificates: Arc<dyn CertificateRepository>,
    requests: Arc<dyn RequestRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl DigestJob {
    pub fn new(
        certificates: Arc<dyn CertificateRepository>,
        requests: Arc<dyn RequestRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self { certificates, requests, users, notifications }
    }

    /// One scan pass: expiry warnings for active certificates plus pending
    /// review digests for approvers. A recipient who already received the
    /// same notice inside its repeat window is skipped, so a daily rescan
    /// does not pile up duplicates. Returns how many records were written.
    pub async fn run_once(&self) -> Result<usize, RepositoryError> {
        let now = Utc::now();
        let roster = self.users.list().await?;

        let mut pending = Vec::new();
        for status in REVIEW_STATUSES {
            pending.extend(self.requests.list_by_status(status).await?);
        }

        let certificates = self.certificates.list_active().await?;

        let mut records = certificate_expiry_warnings(&certificates, now);
        records.extend(pending_approval_digests(&pending, &roster, now));

        let mut written = 0;
        let mut history: HashMap<UserId, Vec<Notification>> = HashMap::new();
        for record in records {
            if !history.contains_key(&record.user_id) {
                let delivered = self.notifications.list_for_user(&record.user_id).await?;
                history.insert(record.user_id.clone(), delivered);
            }
            let delivered = history.entry(record.user_id.clone()).or_default();
            if recently_delivered(delivered, &record, now) {
                continue;
            }
            self.notifications.save(record.clone()).await?;
            delivered.push(record);
            written += 1;
        }
        Ok(written)
    }

    /// Runs the scan immediately and then once per `interval`.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(written) => {
                        info!(
                            event_name = "notification.digest_scan",
                            written, "digest scan complete"
                        );
                    }
                    Err(error) => {
                        warn!(
                            event_name = "notification.digest_scan",
                            error = %error,
                            "digest scan failed, will retry next interval"
                        );
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use trainhub_core::domain::certificate::{Certificate, CertificateStatus};
    use trainhub_core::domain::user::{Platoon, Role, User, UserId};
    use trainhub_db::repositories::{
        CertificateRepository, InMemoryNotificationRepository, InMemoryRequestRepository,
        InMemoryUserRepository, NotificationRepository, SqlCertificateRepository, UserRepository,
    };
    use trainhub_db::{connect_with_settings, migrations};

    use super::DigestJob;

    #[tokio::test]
    async fn scan_writes_expiry_warnings() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let certificates = Arc::new(SqlCertificateRepository::new(pool));
        let users = Arc::new(InMemoryUserRepository::default());
        let notifications = Arc::new(InMemoryNotificationRepository::default());

        let now = Utc::now();
        users
            .save(User {
                id: UserId("u-1".to_string()),
                badge_number: "527".to_string(),
                first_name: "Riley".to_string(),
                last_name: "Demo".to_string(),
                email: "riley@pd.example".to_string(),
                role: Role::Officer,
                department: "Patrol".to_string(),
                rank: "Police Officer".to_string(),
                supervisor_id: None,
                platoon: Some(Platoon::ADays),
            })
            .await
            .expect("save user");
        certificates
            .save(Certificate {
                id: "cert-1".to_string(),
                user_id: UserId("u-1".to_string()),
                request_id: None,
                certificate_number: "CERT-2026-0001".to_string(),
                training_title: "First Aid / CPR".to_string(),
                completion_date: now - Duration::days(700),
                credits_earned: 8.0,
                instructor_name: "T. Alvarez".to_string(),
                issued_at: now - Duration::days(700),
                expires_at: Some(now + Duration::days(30)),
                status: CertificateStatus::Active,
            })
            .await
            .expect("save certificate");

        let job = DigestJob::new(
            certificates,
            Arc::new(InMemoryRequestRepository::default()),
            users,
            notifications.clone(),
        );
        let written = job.run_once().await.expect("scan");
        assert_eq!(written, 1);

        let records = notifications.list_for_user(&UserId("u-1".to_string())).await.expect("list");
        assert_eq!(records.len(), 1);
        assert!(records[0].title.contains("Expir"));

        // Daily reruns inside the repeat window must not re-issue the notice.
        assert_eq!(job.run_once().await.expect("second scan"), 0);
        assert_eq!(job.run_once().await.expect("third scan"), 0);
        let records = notifications.list_for_user(&UserId("u-1".to_string())).await.expect("list");
        assert_eq!(records.len(), 1, "repeated scans must not duplicate the warning");
    }
}
