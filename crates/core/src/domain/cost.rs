use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestId;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    Training,
    Travel,
    Materials,
    Overtime,
    Other,
}

impl CostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Travel => "travel",
            Self::Materials => "materials",
            Self::Overtime => "overtime",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "training" => Some(Self::Training),
            "travel" => Some(Self::Travel),
            "materials" => Some(Self::Materials),
            "overtime" => Some(Self::Overtime),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "paid" => Some(Self::Paid),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One booked training cost against an officer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub id: String,
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub user_badge: Option<String>,
    pub request_id: Option<RequestId>,
    pub training_title: String,
    pub amount: Decimal,
    pub cost_type: CostType,
    pub budget_code: Option<String>,
    pub fiscal_year: Option<String>,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Received,
    Processing,
    Approved,
    Paid,
    Rejected,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "received" => Some(Self::Received),
            "processing" => Some(Self::Processing),
            "approved" => Some(Self::Approved),
            "paid" => Some(Self::Paid),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub vendor_name: Option<String>,
    pub amount: Decimal,
    pub invoice_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: InvoiceStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
