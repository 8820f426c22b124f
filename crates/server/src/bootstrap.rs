use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use trainhub_core::config::{AppConfig, ConfigError, LoadOptions};
use trainhub_db::repositories::{
    CertificateRepository, CostRepository, InvoiceRepository, NotificationRepository,
    RequestRepository, SqlAuditEventRepository, SqlCertificateRepository, SqlCostRepository,
    SqlInvoiceRepository, SqlNotificationRepository, SqlRequestRepository, SqlUserRepository,
    UserRepository,
};
use trainhub_db::{connect, migrations, DbPool};
use trainhub_notify::{Mailer, NoopMailer, TransitionNotifier, WebhookMailer};

use crate::service::ApprovalService;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect to database")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("failed to run database migrations")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Fully wired application state shared by the HTTP routes.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub approvals: Arc<ApprovalService>,
    pub requests: Arc<dyn RequestRepository>,
    pub users: Arc<dyn UserRepository>,
    pub costs: Arc<dyn CostRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "bootstrap.database_connected", url = %config.database.url, "database pool ready");

    let applied = migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "bootstrap.migrations_applied", applied = applied.len(), "schema is current");

    // Validation guarantees a webhook URL whenever email is enabled.
    let mailer: Arc<dyn Mailer> = match (config.email.enabled, config.email.webhook_url.clone()) {
        (true, Some(webhook_url)) => Arc::new(WebhookMailer::new(
            webhook_url,
            config.email.api_key.clone(),
            config.email.sender.clone(),
        )),
        _ => Arc::new(NoopMailer),
    };

    let requests: Arc<dyn RequestRepository> =
        Arc::new(SqlRequestRepository::new(db_pool.clone()));
    let users: Arc<dyn UserRepository> = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlNotificationRepository::new(db_pool.clone()));
    let approvals = Arc::new(ApprovalService::new(
        requests.clone(),
        users.clone(),
        notifications.clone(),
        Arc::new(SqlAuditEventRepository::new(db_pool.clone())),
        TransitionNotifier::new(mailer),
    ));

    Ok(Application {
        config,
        approvals,
        requests,
        users,
        costs: Arc::new(SqlCostRepository::new(db_pool.clone())),
        invoices: Arc::new(SqlInvoiceRepository::new(db_pool.clone())),
        certificates: Arc::new(SqlCertificateRepository::new(db_pool.clone())),
        notifications,
        db_pool,
    })
}
