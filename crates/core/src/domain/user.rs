use serde::{Deserialize, Serialize};

use crate::chain::Rank;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Coarse system role, distinct from the sworn rank carried in `User::rank`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Officer,
    Supervisor,
    Administrator,
    Accounting,
    Staff,
    TrainingCoordinator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Officer => "officer",
            Self::Supervisor => "supervisor",
            Self::Administrator => "administrator",
            Self::Accounting => "accounting",
            Self::Staff => "staff",
            Self::TrainingCoordinator => "training_coordinator",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "officer" => Some(Self::Officer),
            "supervisor" => Some(Self::Supervisor),
            "administrator" => Some(Self::Administrator),
            "accounting" => Some(Self::Accounting),
            "staff" => Some(Self::Staff),
            "training_coordinator" => Some(Self::TrainingCoordinator),
            _ => None,
        }
    }

    /// Administrators and training coordinators may act at any approval level.
    pub fn can_approve_any_level(&self) -> bool {
        matches!(self, Self::Administrator | Self::TrainingCoordinator)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platoon {
    ADays,
    BNights,
    CNights,
    DDays,
}

impl Platoon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ADays => "A-Days",
            Self::BNights => "B-Nights",
            Self::CNights => "C-Nights",
            Self::DDays => "D-Days",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A-Days" => Some(Self::ADays),
            "B-Nights" => Some(Self::BNights),
            "C-Nights" => Some(Self::CNights),
            "D-Days" => Some(Self::DDays),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub badge_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    /// Free-form sworn rank title, e.g. "Police Sergeant". Resolved to a
    /// chain [`Rank`] via [`User::resolved_rank`].
    pub rank: String,
    pub supervisor_id: Option<UserId>,
    pub platoon: Option<Platoon>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Maps the free-form rank title onto the approval-chain rank ladder.
    /// Titles that contain a ladder rank ("Detective Sergeant") resolve to it.
    pub fn resolved_rank(&self) -> Option<Rank> {
        Rank::from_title(&self.rank)
    }
}
