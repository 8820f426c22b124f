use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestId;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Active,
    Expired,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub user_id: UserId,
    pub request_id: Option<RequestId>,
    pub certificate_number: String,
    pub training_title: String,
    pub completion_date: DateTime<Utc>,
    pub credits_earned: f64,
    pub instructor_name: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: CertificateStatus,
}

impl Certificate {
    /// True when the certificate expires within `window_days` of `now` and is
    /// still active. Drives the expiration-warning notifications.
    pub fn expires_within(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        if self.status != CertificateStatus::Active {
            return false;
        }
        match self.expires_at {
            Some(expires) => {
                let days = expires.signed_duration_since(now).num_days();
                (0..=window_days).contains(&days)
            }
            None => false,
        }
    }
}
