use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::{standard_chain, ChainRole, Rank};
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Closed request lifecycle. The string forms are the persisted labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Submitted,
    SupervisorReview,
    AdminApproval,
    SergeantReview,
    LieutenantReview,
    CommanderReview,
    ChiefApproval,
    Approved,
    Denied,
    Scheduled,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::SupervisorReview => "supervisor_review",
            Self::AdminApproval => "admin_approval",
            Self::SergeantReview => "sergeant_review",
            Self::LieutenantReview => "lieutenant_review",
            Self::CommanderReview => "commander_review",
            Self::ChiefApproval => "chief_approval",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "supervisor_review" => Some(Self::SupervisorReview),
            "admin_approval" => Some(Self::AdminApproval),
            "sergeant_review" => Some(Self::SergeantReview),
            "lieutenant_review" => Some(Self::LieutenantReview),
            "commander_review" => Some(Self::CommanderReview),
            "chief_approval" => Some(Self::ChiefApproval),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// No further chain transition happens from these states. `Approved` is
    /// terminal for the chain but may still be scheduled/completed out of band.
    pub fn is_chain_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Denied | Self::Scheduled | Self::Completed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingType {
    Individual,
    Group,
    Department,
}

/// Explicit request variant tag. The original inferred "external" from the
/// presence of an `eventName` property; here the variant is carried.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestKind {
    Standard {
        training_id: String,
        training_title: String,
    },
    Internal {
        course_name: String,
        training_date: DateTime<Utc>,
        location: String,
        instructor: String,
        attendees: Vec<UserId>,
    },
    External {
        event_name: String,
        organization: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        location: String,
        cost_estimate: Decimal,
        justification: String,
    },
    Custom {
        title: String,
        description: String,
        training_type: TrainingType,
        requested_date: DateTime<Utc>,
        duration: String,
        location: String,
        estimated_cost: Decimal,
        justification: String,
    },
}

impl RequestKind {
    pub fn title(&self) -> &str {
        match self {
            Self::Standard { training_title, .. } => training_title,
            Self::Internal { course_name, .. } => course_name,
            Self::External { event_name, .. } => event_name,
            Self::Custom { title, .. } => title,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard { .. } => "standard",
            Self::Internal { .. } => "internal",
            Self::External { .. } => "external",
            Self::Custom { .. } => "custom",
        }
    }

    /// Date the training would take place, used for the 30-day lead check.
    pub fn training_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Standard { .. } => None,
            Self::Internal { training_date, .. } => Some(*training_date),
            Self::External { start_date, .. } => Some(*start_date),
            Self::Custom { requested_date, .. } => Some(*requested_date),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Approved,
    Denied,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

/// Audit tuple for one chain step, written exactly once when that step is
/// decided and never overwritten afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDecision {
    pub approver_id: UserId,
    pub approver_name: String,
    pub decided_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub outcome: StepOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub role: ChainRole,
    pub decision: Option<StepDecision>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub id: RequestId,
    pub requester_id: UserId,
    pub requester_name: String,
    pub requester_badge: String,
    pub kind: RequestKind,
    pub status: RequestStatus,
    /// Fixed at submission; changing it means filing a new request.
    pub approval_chain: Vec<ChainRole>,
    /// Zero-based pointer into `approval_chain`; advances monotonically.
    pub current_approval_level: usize,
    pub steps: Vec<ApprovalStep>,
    pub denial_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub submitted_within_30_days: Option<bool>,
    pub cpt_hours: Option<f64>,
    /// Optimistic-concurrency counter bumped on every transition write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingRequest {
    /// Builds a freshly submitted request. Standard/internal/external kinds
    /// get the implicit supervisor → administrator chain; custom kinds use
    /// the supplied rank list.
    pub fn submit(
        id: RequestId,
        requester_id: UserId,
        requester_name: String,
        requester_badge: String,
        kind: RequestKind,
        custom_chain: Option<Vec<Rank>>,
        now: DateTime<Utc>,
    ) -> Self {
        let approval_chain: Vec<ChainRole> = match (&kind, custom_chain) {
            (RequestKind::Custom { .. }, Some(ranks)) => {
                ranks.into_iter().map(ChainRole::Rank).collect()
            }
            (RequestKind::Custom { .. }, None) => vec![ChainRole::Rank(Rank::Sergeant)],
            _ => standard_chain(),
        };

        let status = approval_chain
            .first()
            .map(ChainRole::review_status)
            .unwrap_or(RequestStatus::Submitted);
        let steps =
            approval_chain.iter().map(|role| ApprovalStep { role: *role, decision: None }).collect();
        let submitted_within_30_days = kind
            .training_date()
            .map(|date| date.signed_duration_since(now).num_days() >= 30);

        Self {
            id,
            requester_id,
            requester_name,
            requester_badge,
            kind,
            status,
            approval_chain,
            current_approval_level: 0,
            steps,
            denial_reason: None,
            submitted_at: now,
            scheduled_for: None,
            submitted_within_30_days,
            cpt_hours: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_fully_approved(&self) -> bool {
        self.status == RequestStatus::Approved
            && self.current_approval_level == self.approval_chain.len()
    }
}
