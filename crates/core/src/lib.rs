pub mod audit;
pub mod chain;
pub mod config;
pub mod domain;
pub mod errors;
pub mod reports;
pub mod workflow;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome};
pub use chain::{current_role, next_role, standard_chain, ChainRole, Rank};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::certificate::{Certificate, CertificateStatus};
pub use domain::cost::{CostEntry, CostType, Invoice, InvoiceStatus, PaymentStatus};
pub use domain::notification::{EmailMessage, Notification, NotificationKind};
pub use domain::request::{
    ApprovalStep, RequestId, RequestKind, RequestStatus, StepDecision, StepOutcome,
    TrainingRequest, TrainingType,
};
pub use domain::user::{Platoon, Role, User, UserId};
pub use errors::{ApplicationError, InterfaceError};
pub use reports::{DateRange, DateRangeType, ReportData};
pub use workflow::{
    ApprovalAction, ApprovalEngine, Actor, NotifyTarget, TransitionOutcome, WorkflowError,
};
