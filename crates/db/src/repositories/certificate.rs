use chrono::{DateTime, Utc};
use sqlx::Row;

use trainhub_core::domain::certificate::{Certificate, CertificateStatus};
use trainhub_core::domain::request::RequestId;
use trainhub_core::domain::user::UserId;

use super::{CertificateRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCertificateRepository {
    pool: DbPool,
}

impl SqlCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn row_to_certificate(row: &sqlx::sqlite::SqliteRow) -> Result<Certificate, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let request_id: Option<String> = row.try_get("request_id").map_err(decode_err)?;
    let certificate_number: String = row.try_get("certificate_number").map_err(decode_err)?;
    let training_title: String = row.try_get("training_title").map_err(decode_err)?;
    let completion_date_str: String = row.try_get("completion_date").map_err(decode_err)?;
    let credits_earned: f64 = row.try_get("credits_earned").map_err(decode_err)?;
    let instructor_name: String = row.try_get("instructor_name").map_err(decode_err)?;
    let issued_at_str: String = row.try_get("issued_at").map_err(decode_err)?;
    let expires_at_str: Option<String> = row.try_get("expires_at").map_err(decode_err)?;
    let status_str: String = row.try_get("status").map_err(decode_err)?;

    Ok(Certificate {
        id,
        user_id: UserId(user_id),
        request_id: request_id.map(RequestId),
        certificate_number,
        training_title,
        completion_date: parse_datetime(&completion_date_str)?,
        credits_earned,
        instructor_name,
        issued_at: parse_datetime(&issued_at_str)?,
        expires_at: match expires_at_str {
            Some(raw) => Some(parse_datetime(&raw)?),
            None => None,
        },
        status: CertificateStatus::parse(&status_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_str}`")))?,
    })
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, request_id, certificate_number, training_title,
            completion_date, credits_earned, instructor_name, issued_at, expires_at, status
     FROM certificates";

#[async_trait::async_trait]
impl CertificateRepository for SqlCertificateRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY issued_at DESC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_certificate).collect::<Result<Vec<_>, _>>()
    }

    async fn list_active(&self) -> Result<Vec<Certificate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status = 'active' ORDER BY expires_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_certificate).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, certificate: Certificate) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO certificates
                 (id, user_id, request_id, certificate_number, training_title,
                  completion_date, credits_earned, instructor_name, issued_at,
                  expires_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 expires_at = excluded.expires_at,
                 status = excluded.status",
        )
        .bind(&certificate.id)
        .bind(&certificate.user_id.0)
        .bind(certificate.request_id.as_ref().map(|id| id.0.clone()))
        .bind(&certificate.certificate_number)
        .bind(&certificate.training_title)
        .bind(certificate.completion_date.to_rfc3339())
        .bind(certificate.credits_earned)
        .bind(&certificate.instructor_name)
        .bind(certificate.issued_at.to_rfc3339())
        .bind(certificate.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(certificate.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
