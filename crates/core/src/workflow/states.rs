use serde::{Deserialize, Serialize};

use crate::chain::{ChainRole, Rank};
use crate::domain::request::{RequestStatus, StepDecision};
use crate::domain::user::{Role, User, UserId};

/// Action a reviewer takes on the request at its current chain level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Deny { reason: Option<String> },
}

/// Identity acting on a request. Built from the authenticated user; the
/// engine never reaches into ambient session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub rank: Option<Rank>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.full_name(),
            role: user.role,
            rank: user.resolved_rank(),
        }
    }
}

/// Who must be told about a committed transition. The requester is always
/// notified; approvers only when the request advanced to their step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyTarget {
    Requester,
    Approvers(ChainRole),
}

/// Result of evaluating an action: the field patch the caller persists and
/// the notification fan-out it owes afterwards. Nothing is mutated here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub previous_level: usize,
    pub new_level: usize,
    /// Chain index whose audit tuple gets written by this transition.
    pub stamped_level: usize,
    pub stamp: StepDecision,
    pub denial_reason: Option<String>,
    pub notifications: Vec<NotifyTarget>,
}
