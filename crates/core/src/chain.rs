//! Approval chain resolution: who has to act at a given level, and which
//! review status a request carries while it waits for them.

use serde::{Deserialize, Serialize};

use crate::domain::request::RequestStatus;

/// Sworn rank ladder used by custom approval chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Sergeant,
    Lieutenant,
    Commander,
    Chief,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sergeant => "Sergeant",
            Self::Lieutenant => "Lieutenant",
            Self::Commander => "Commander",
            Self::Chief => "Chief",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Sergeant" => Some(Self::Sergeant),
            "Lieutenant" => Some(Self::Lieutenant),
            "Commander" => Some(Self::Commander),
            "Chief" => Some(Self::Chief),
            _ => None,
        }
    }

    /// Resolves a free-form rank title by containment, highest rank first so
    /// "Chief of Police" never resolves to a lower ladder entry.
    pub fn from_title(title: &str) -> Option<Self> {
        for rank in [Self::Chief, Self::Commander, Self::Lieutenant, Self::Sergeant] {
            if title.contains(rank.as_str()) {
                return Some(rank);
            }
        }
        None
    }

    /// Review status a request carries while waiting on this rank.
    /// Bijective with [`Rank::for_status`].
    pub fn review_status(&self) -> RequestStatus {
        match self {
            Self::Sergeant => RequestStatus::SergeantReview,
            Self::Lieutenant => RequestStatus::LieutenantReview,
            Self::Commander => RequestStatus::CommanderReview,
            Self::Chief => RequestStatus::ChiefApproval,
        }
    }

    pub fn for_status(status: &RequestStatus) -> Option<Self> {
        match status {
            RequestStatus::SergeantReview => Some(Self::Sergeant),
            RequestStatus::LieutenantReview => Some(Self::Lieutenant),
            RequestStatus::CommanderReview => Some(Self::Commander),
            RequestStatus::ChiefApproval => Some(Self::Chief),
            _ => None,
        }
    }
}

/// One entry in an approval chain. Standard/internal/external requests use
/// the coarse supervisor/administrator steps; custom requests name ranks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainRole {
    Supervisor,
    Administrator,
    Rank(Rank),
}

impl ChainRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Supervisor => "Supervisor",
            Self::Administrator => "Administrator",
            Self::Rank(rank) => rank.as_str(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Supervisor" => Some(Self::Supervisor),
            "Administrator" => Some(Self::Administrator),
            other => Rank::parse(other).map(Self::Rank),
        }
    }

    /// Status a request carries while this step is the current one.
    pub fn review_status(&self) -> RequestStatus {
        match self {
            Self::Supervisor => RequestStatus::SupervisorReview,
            Self::Administrator => RequestStatus::AdminApproval,
            Self::Rank(rank) => rank.review_status(),
        }
    }
}

/// Role required at `level`, or `None` at/past the terminal index.
/// Callers must bounds-check rather than index the chain directly.
pub fn current_role(chain: &[ChainRole], level: usize) -> Option<ChainRole> {
    chain.get(level).copied()
}

/// Role that acts after the current level, if the chain continues.
pub fn next_role(chain: &[ChainRole], level: usize) -> Option<ChainRole> {
    chain.get(level + 1).copied()
}

/// Implicit two-step chain used by standard, internal, and external requests.
pub fn standard_chain() -> Vec<ChainRole> {
    vec![ChainRole::Supervisor, ChainRole::Administrator]
}
