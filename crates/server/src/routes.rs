//! HTTP surface for the approval workflow and budget reporting.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use trainhub_core::chain::Rank;
use trainhub_core::config::BudgetConfig;
use trainhub_core::domain::request::{RequestId, RequestKind, RequestStatus};
use trainhub_core::domain::user::UserId;
use trainhub_core::errors::{ApplicationError, InterfaceError};
use trainhub_core::reports::{
    cost_entries_csv, excel_workbook, invoices_csv, officer_summaries_csv, prepare_report,
    resolve_range, DateRangeType, ReportData,
};
use trainhub_core::workflow::ApprovalAction;
use trainhub_db::repositories::{
    CostRepository, InvoiceRepository, NotificationRepository, UserRepository,
};

use crate::bootstrap::Application;
use crate::report_render::ReportRenderer;
use crate::service::ApprovalService;

#[derive(Clone)]
pub struct AppState {
    pub approvals: Arc<ApprovalService>,
    pub users: Arc<dyn UserRepository>,
    pub costs: Arc<dyn CostRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub renderer: Arc<ReportRenderer>,
    pub budget: BudgetConfig,
}

impl AppState {
    pub fn from_application(app: &Application, renderer: ReportRenderer) -> Self {
        Self {
            approvals: app.approvals.clone(),
            users: app.users.clone(),
            costs: app.costs.clone(),
            invoices: app.invoices.clone(),
            notifications: app.notifications.clone(),
            renderer: Arc::new(renderer),
            budget: app.config.budget.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/requests", post(submit_request).get(list_requests))
        .route("/requests/{id}", get(get_request))
        .route("/requests/{id}/approve", post(approve_request))
        .route("/requests/{id}/deny", post(deny_request))
        .route("/requests/{id}/schedule", post(schedule_request))
        .route("/requests/{id}/complete", post(complete_request))
        .route("/reports/budget", get(budget_report))
        .route("/reports/budget/costs.csv", get(costs_csv))
        .route("/reports/budget/invoices.csv", get(invoice_csv))
        .route("/reports/budget/officers.csv", get(officers_csv))
        .route("/users/{id}/notifications", get(user_notifications))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wraps [`InterfaceError`] so handlers can use `?` and still produce a
/// stable JSON error body with the correlation id.
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, correlation_id) = match &self.0 {
            InterfaceError::BadRequest { correlation_id, .. } => {
                (StatusCode::BAD_REQUEST, correlation_id.clone())
            }
            InterfaceError::Forbidden { correlation_id, .. } => {
                (StatusCode::FORBIDDEN, correlation_id.clone())
            }
            InterfaceError::NotFound { correlation_id, .. } => {
                (StatusCode::NOT_FOUND, correlation_id.clone())
            }
            InterfaceError::Conflict { correlation_id, .. } => {
                (StatusCode::CONFLICT, correlation_id.clone())
            }
            InterfaceError::ServiceUnavailable { correlation_id, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
            }
            InterfaceError::Internal { correlation_id, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
            }
        };
        let body = Json(json!({
            "error": self.0.user_message(),
            "correlation_id": correlation_id,
        }));
        (status, body).into_response()
    }
}

fn api(error: ApplicationError, correlation_id: &str) -> ApiError {
    ApiError(error.into_interface(correlation_id))
}

fn storage(error: trainhub_db::repositories::RepositoryError, correlation_id: &str) -> ApiError {
    api(ApplicationError::Persistence(error.to_string()), correlation_id)
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Deserialize)]
struct SubmitRequestBody {
    requester_id: String,
    kind: RequestKind,
    custom_chain: Option<Vec<Rank>>,
}

async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let request = state
        .approvals
        .submit(UserId(body.requester_id), body.kind, body.custom_chain, &correlation_id)
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Deserialize)]
struct DecisionBody {
    actor_id: String,
    reason: Option<String>,
}

async fn approve_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let request = state
        .approvals
        .decide(
            &RequestId(id),
            &UserId(body.actor_id),
            ApprovalAction::Approve,
            &correlation_id,
        )
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok(Json(request))
}

async fn deny_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let request = state
        .approvals
        .decide(
            &RequestId(id),
            &UserId(body.actor_id),
            ApprovalAction::Deny { reason: body.reason },
            &correlation_id,
        )
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok(Json(request))
}

#[derive(Deserialize)]
struct ScheduleBody {
    scheduled_for: DateTime<Utc>,
}

async fn schedule_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let request = state
        .approvals
        .schedule(&RequestId(id), body.scheduled_for, &correlation_id)
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok(Json(request))
}

#[derive(Deserialize)]
struct CompleteBody {
    cpt_hours: Option<f64>,
}

async fn complete_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let request = state
        .approvals
        .complete(&RequestId(id), body.cpt_hours, &correlation_id)
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok(Json(request))
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let request = state
        .approvals
        .find(&RequestId(id))
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok(Json(request))
}

#[derive(Deserialize)]
struct ListQuery {
    status: String,
}

async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let status = RequestStatus::parse(&query.status).ok_or_else(|| {
        ApiError(InterfaceError::BadRequest {
            message: format!("unknown status {}", query.status),
            correlation_id: correlation_id.clone(),
        })
    })?;
    let requests = state
        .approvals
        .list_by_status(status)
        .await
        .map_err(|error| api(error, &correlation_id))?;
    Ok(Json(requests))
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReportFormat {
    Json,
    Csv,
    Excel,
    Html,
}

#[derive(Deserialize)]
struct ReportQuery {
    range: Option<DateRangeType>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    format: Option<ReportFormat>,
}

async fn build_report(
    state: &AppState,
    query: &ReportQuery,
    correlation_id: &str,
) -> Result<ReportData, ApiError> {
    let range = resolve_range(
        query.range.unwrap_or(DateRangeType::Year),
        query.start,
        query.end,
        Utc::now().date_naive(),
    );
    let costs = state.costs.list().await.map_err(|e| storage(e, correlation_id))?;
    let invoices = state.invoices.list().await.map_err(|e| storage(e, correlation_id))?;
    let users = state.users.list().await.map_err(|e| storage(e, correlation_id))?;
    let total_budget = Decimal::from_f64(state.budget.total_budget).unwrap_or_default();

    Ok(prepare_report(
        "Training Budget Report",
        &costs,
        &invoices,
        &users,
        total_budget,
        state.budget.fiscal_year.clone(),
        range,
        Utc::now(),
    ))
}

fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}

async fn budget_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id();
    let report = build_report(&state, &query, &correlation_id).await?;

    let response = match query.format.unwrap_or(ReportFormat::Json) {
        ReportFormat::Json => Json(report).into_response(),
        ReportFormat::Csv => attachment(
            "text/csv; charset=utf-8",
            "budget-report.csv",
            cost_entries_csv(&report.cost_entries),
        ),
        ReportFormat::Excel => attachment(
            "application/vnd.ms-excel",
            "budget-report.xls",
            excel_workbook(&report),
        ),
        ReportFormat::Html => {
            let html = state.renderer.render_budget(&report).map_err(|error| {
                api(ApplicationError::Integration(error.to_string()), &correlation_id)
            })?;
            ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response()
        }
    };
    Ok(response)
}

async fn costs_csv(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id();
    let report = build_report(&state, &query, &correlation_id).await?;
    Ok(attachment(
        "text/csv; charset=utf-8",
        "cost-entries.csv",
        cost_entries_csv(&report.cost_entries),
    ))
}

async fn invoice_csv(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id();
    let report = build_report(&state, &query, &correlation_id).await?;
    Ok(attachment("text/csv; charset=utf-8", "invoices.csv", invoices_csv(&report.invoices)))
}

async fn officers_csv(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id();
    let report = build_report(&state, &query, &correlation_id).await?;
    Ok(attachment(
        "text/csv; charset=utf-8",
        "officer-costs.csv",
        officer_summaries_csv(&report.officer_summaries),
    ))
}

async fn user_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let notifications = state
        .notifications
        .list_for_user(&UserId(id))
        .await
        .map_err(|e| storage(e, &correlation_id))?;
    Ok(Json(notifications))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    state.notifications.mark_read(&id).await.map_err(|e| storage(e, &correlation_id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use trainhub_core::config::BudgetConfig;
    use trainhub_core::domain::user::{Platoon, Role, User, UserId};
    use trainhub_db::repositories::{
        InMemoryNotificationRepository, InMemoryRequestRepository, InMemoryUserRepository,
        SqlAuditEventRepository, SqlCostRepository, SqlInvoiceRepository, UserRepository,
    };
    use trainhub_db::{connect_with_settings, migrations};
    use trainhub_notify::{RecordingMailer, TransitionNotifier};

    use crate::report_render::ReportRenderer;
    use crate::service::ApprovalService;

    use super::{router, AppState};

    async fn state() -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let users = Arc::new(InMemoryUserRepository::default());
        let notifications = Arc::new(InMemoryNotificationRepository::default());
        let approvals = Arc::new(ApprovalService::new(
            Arc::new(InMemoryRequestRepository::default()),
            users.clone(),
            notifications.clone(),
            Arc::new(SqlAuditEventRepository::new(pool.clone())),
            TransitionNotifier::new(Arc::new(RecordingMailer::default())),
        ));

        AppState {
            approvals,
            users,
            costs: Arc::new(SqlCostRepository::new(pool.clone())),
            invoices: Arc::new(SqlInvoiceRepository::new(pool.clone())),
            notifications,
            renderer: Arc::new(ReportRenderer::with_embedded_templates().expect("templates")),
            budget: BudgetConfig { fiscal_year: "FY2026".to_string(), total_budget: 500_000.0 },
        }
    }

    fn officer(id: &str, role: Role, rank: &str) -> User {
        User {
            id: UserId(id.to_string()),
            badge_number: format!("b-{id}"),
            first_name: id.to_string(),
            last_name: "Test".to_string(),
            email: format!("{id}@pd.example"),
            role,
            department: "Patrol".to_string(),
            rank: rank.to_string(),
            supervisor_id: None,
            platoon: Some(Platoon::ADays),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn submit_and_approve_over_http() {
        let state = state().await;
        state.users.save(officer("req", Role::Officer, "Police Officer")).await.expect("save");
        state.users.save(officer("sgt", Role::Supervisor, "Police Sergeant")).await.expect("save");

        let app = router(state);
        let requested_date = (Utc::now() + Duration::days(45)).to_rfc3339();
        let submit = json!({
            "requester_id": "req",
            "kind": {
                "kind": "custom",
                "title": "Crisis Negotiation",
                "description": "40-hour course",
                "training_type": "individual",
                "requested_date": requested_date,
                "duration": "40 hours",
                "location": "Academy",
                "estimated_cost": "1200.00",
                "justification": "Team requirement"
            },
            "custom_chain": ["Sergeant"]
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/requests")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(submit.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "sergeant_review");
        let id = created["id"].as_str().expect("id").to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/requests/{id}/approve"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "actor_id": "sgt" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let approved = body_json(response).await;
        assert_eq!(approved["status"], "approved");
    }

    #[tokio::test]
    async fn unauthorized_actor_gets_forbidden() {
        let state = state().await;
        state.users.save(officer("req", Role::Officer, "Police Officer")).await.expect("save");
        state.users.save(officer("ofc", Role::Officer, "Police Officer")).await.expect("save");

        let app = router(state);
        let requested_date = (Utc::now() + Duration::days(45)).to_rfc3339();
        let submit = json!({
            "requester_id": "req",
            "kind": {
                "kind": "custom",
                "title": "Firearms Requalification",
                "description": "Range day",
                "training_type": "individual",
                "requested_date": requested_date,
                "duration": "8 hours",
                "location": "Range",
                "estimated_cost": "150.00",
                "justification": "Annual requirement"
            },
            "custom_chain": ["Sergeant"]
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/requests")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(submit.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let created = body_json(response).await;
        let id = created["id"].as_str().expect("id").to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/requests/{id}/approve"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "actor_id": "ofc" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let error = body_json(response).await;
        assert_eq!(error["error"], "You are not authorized to act on this request.");
    }

    #[tokio::test]
    async fn missing_request_returns_not_found() {
        let app = router(state().await);
        let response = app
            .oneshot(Request::builder().uri("/requests/TR-missing").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn budget_report_csv_has_headers() {
        let app = router(state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/reports/budget?format=csv")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/csv"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.starts_with("Date,Officer,Badge,Training"));
    }

    #[tokio::test]
    async fn budget_report_html_renders() {
        let app = router(state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/reports/budget?format=html")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.contains("Training Budget Report"));
        assert!(text.contains("FY2026"));
    }
}
