use async_trait::async_trait;
use thiserror::Error;

use trainhub_core::audit::AuditEvent;
use trainhub_core::domain::certificate::Certificate;
use trainhub_core::domain::cost::{CostEntry, Invoice};
use trainhub_core::domain::notification::Notification;
use trainhub_core::domain::request::{RequestId, RequestStatus, TrainingRequest};
use trainhub_core::domain::user::{User, UserId};
use trainhub_core::workflow::TransitionOutcome;

pub mod audit;
pub mod certificate;
pub mod cost;
pub mod memory;
pub mod notification;
pub mod request;
pub mod user;

pub use audit::SqlAuditEventRepository;
pub use certificate::SqlCertificateRepository;
pub use cost::{SqlCostRepository, SqlInvoiceRepository};
pub use memory::{InMemoryNotificationRepository, InMemoryRequestRepository, InMemoryUserRepository};
pub use notification::SqlNotificationRepository;
pub use request::SqlRequestRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<TrainingRequest>, RepositoryError>;

    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<TrainingRequest>, RepositoryError>;

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<TrainingRequest>, RepositoryError>;

    async fn save(&self, request: TrainingRequest) -> Result<(), RepositoryError>;

    /// Version-guarded write for out-of-band updates (scheduling,
    /// completion). The row is replaced only while the stored version still
    /// matches the snapshot the update was computed against; otherwise
    /// `Conflict` is returned and nothing is written.
    async fn save_guarded(&self, request: TrainingRequest) -> Result<(), RepositoryError>;

    /// Compare-and-swap transition write. The request row is updated only if
    /// its stored status, level, and version still match the state the
    /// outcome was computed against; otherwise `Conflict` is returned and
    /// nothing is written. The step stamp lands in the same transaction.
    async fn apply_transition(
        &self,
        updated: &TrainingRequest,
        outcome: &TransitionOutcome,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CostRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<CostEntry>, RepositoryError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<CostEntry>, RepositoryError>;
    async fn save(&self, entry: CostEntry) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Invoice>, RepositoryError>;
    async fn save(&self, invoice: Invoice) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, RepositoryError>;
    async fn save(&self, notification: Notification) -> Result<(), RepositoryError>;
    async fn mark_read(&self, id: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Certificate>, RepositoryError>;
    async fn save(&self, certificate: Certificate) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}
