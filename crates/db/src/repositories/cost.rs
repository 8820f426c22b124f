use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use trainhub_core::domain::cost::{
    CostEntry, CostType, Invoice, InvoiceStatus, PaymentStatus,
};
use trainhub_core::domain::request::RequestId;
use trainhub_core::domain::user::UserId;

use super::{CostRepository, InvoiceRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCostRepository {
    pool: DbPool,
}

impl SqlCostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub struct SqlInvoiceRepository {
    pool: DbPool,
}

impl SqlInvoiceRepository {
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

// Amounts are stored as exact decimal strings, never as floats.
fn parse_amount(raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(decode_err)
}

fn row_to_cost(row: &sqlx::sqlite::SqliteRow) -> Result<CostEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let user_name: Option<String> = row.try_get("user_name").map_err(decode_err)?;
    let user_badge: Option<String> = row.try_get("user_badge").map_err(decode_err)?;
    let request_id: Option<String> = row.try_get("request_id").map_err(decode_err)?;
    let training_title: String = row.try_get("training_title").map_err(decode_err)?;
    let amount_str: String = row.try_get("amount").map_err(decode_err)?;
    let cost_type_str: String = row.try_get("cost_type").map_err(decode_err)?;
    let budget_code: Option<String> = row.try_get("budget_code").map_err(decode_err)?;
    let fiscal_year: Option<String> = row.try_get("fiscal_year").map_err(decode_err)?;
    let payment_status_str: String = row.try_get("payment_status").map_err(decode_err)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(CostEntry {
        id,
        user_id: UserId(user_id),
        user_name,
        user_badge,
        request_id: request_id.map(RequestId),
        training_title,
        amount: parse_amount(&amount_str)?,
        cost_type: CostType::parse(&cost_type_str).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown cost type `{cost_type_str}`"))
        })?,
        budget_code,
        fiscal_year,
        payment_status: PaymentStatus::parse(&payment_status_str).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown payment status `{payment_status_str}`"))
        })?,
        notes,
        created_at: parse_datetime(&created_at_str)?,
    })
}

fn row_to_invoice(row: &sqlx::sqlite::SqliteRow) -> Result<Invoice, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let invoice_number: String = row.try_get("invoice_number").map_err(decode_err)?;
    let vendor_name: Option<String> = row.try_get("vendor_name").map_err(decode_err)?;
    let amount_str: String = row.try_get("amount").map_err(decode_err)?;
    let invoice_date_str: String = row.try_get("invoice_date").map_err(decode_err)?;
    let due_date_str: Option<String> = row.try_get("due_date").map_err(decode_err)?;
    let status_str: String = row.try_get("status").map_err(decode_err)?;
    let description: Option<String> = row.try_get("description").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Invoice {
        id,
        invoice_number,
        vendor_name,
        amount: parse_amount(&amount_str)?,
        invoice_date: parse_datetime(&invoice_date_str)?,
        due_date: match due_date_str {
            Some(raw) => Some(parse_datetime(&raw)?),
            None => None,
        },
        status: InvoiceStatus::parse(&status_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_str}`")))?,
        description,
        created_at: parse_datetime(&created_at_str)?,
    })
}

#[async_trait::async_trait]
impl CostRepository for SqlCostRepository {
    async fn list(&self) -> Result<Vec<CostEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, user_name, user_badge, request_id, training_title, amount,
                    cost_type, budget_code, fiscal_year, payment_status, notes, created_at
             FROM cost_entries ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_cost).collect::<Result<Vec<_>, _>>()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<CostEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, user_name, user_badge, request_id, training_title, amount,
                    cost_type, budget_code, fiscal_year, payment_status, notes, created_at
             FROM cost_entries WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_cost).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, entry: CostEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cost_entries
                 (id, user_id, user_name, user_badge, request_id, training_title, amount,
                  cost_type, budget_code, fiscal_year, payment_status, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 amount = excluded.amount,
                 cost_type = excluded.cost_type,
                 budget_code = excluded.budget_code,
                 fiscal_year = excluded.fiscal_year,
                 payment_status = excluded.payment_status,
                 notes = excluded.notes",
        )
        .bind(&entry.id)
        .bind(&entry.user_id.0)
        .bind(&entry.user_name)
        .bind(&entry.user_badge)
        .bind(entry.request_id.as_ref().map(|id| id.0.clone()))
        .bind(&entry.training_title)
        .bind(entry.amount.to_string())
        .bind(entry.cost_type.as_str())
        .bind(&entry.budget_code)
        .bind(&entry.fiscal_year)
        .bind(entry.payment_status.as_str())
        .bind(&entry.notes)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl InvoiceRepository for SqlInvoiceRepository {
    async fn list(&self) -> Result<Vec<Invoice>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, invoice_number, vendor_name, amount, invoice_date, due_date,
                    status, description, created_at
             FROM invoices ORDER BY invoice_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_invoice).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, invoice: Invoice) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO invoices
                 (id, invoice_number, vendor_name, amount, invoice_date, due_date,
                  status, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 vendor_name = excluded.vendor_name,
                 amount = excluded.amount,
                 due_date = excluded.due_date,
                 status = excluded.status,
                 description = excluded.description",
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.vendor_name)
        .bind(invoice.amount.to_string())
        .bind(invoice.invoice_date.to_rfc3339())
        .bind(invoice.due_date.map(|dt| dt.to_rfc3339()))
        .bind(invoice.status.as_str())
        .bind(&invoice.description)
        .bind(invoice.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
