use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::commands::CommandResult;
use trainhub_core::chain::Rank;
use trainhub_core::config::{AppConfig, LoadOptions};
use trainhub_core::domain::cost::{CostEntry, CostType, Invoice, InvoiceStatus, PaymentStatus};
use trainhub_core::domain::request::{RequestId, RequestKind, TrainingRequest, TrainingType};
use trainhub_core::domain::user::{Platoon, Role, User, UserId};
use trainhub_db::repositories::{
    CostRepository, InvoiceRepository, RequestRepository, SqlCostRepository, SqlInvoiceRepository,
    SqlRequestRepository, SqlUserRepository, UserRepository,
};
use trainhub_db::{connect, migrations};

/// Fixed timestamp so repeated seed runs produce byte-identical rows.
fn seed_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).single().unwrap_or_default()
}

fn roster() -> Vec<User> {
    let entries: [(&str, &str, &str, Role, &str, &str); 6] = [
        ("u-chief", "100", "Pat", Role::Administrator, "Chief of Police", "Administration"),
        ("u-cmdr", "210", "Alex", Role::Administrator, "Police Commander", "Operations"),
        ("u-lt", "305", "Morgan", Role::Supervisor, "Police Lieutenant", "Patrol"),
        ("u-sgt", "412", "Jordan", Role::Supervisor, "Police Sergeant", "Patrol"),
        ("u-ofc1", "527", "Riley", Role::Officer, "Police Officer", "Patrol"),
        ("u-ofc2", "534", "Casey", Role::Officer, "Police Officer", "Investigations"),
    ];
    entries
        .into_iter()
        .map(|(id, badge, first, role, rank, department)| User {
            id: UserId(id.to_string()),
            badge_number: badge.to_string(),
            first_name: first.to_string(),
            last_name: "Demo".to_string(),
            email: format!("{first}.demo@pd.example").to_lowercase(),
            role,
            department: department.to_string(),
            rank: rank.to_string(),
            supervisor_id: (role == Role::Officer).then(|| UserId("u-sgt".to_string())),
            platoon: Some(Platoon::ADays),
        })
        .collect()
}

fn cost_entries() -> Vec<CostEntry> {
    let rows: [(&str, &str, &str, i64, CostType, PaymentStatus); 4] = [
        ("cost-001", "u-ofc1", "Crisis Intervention", 45_000, CostType::Training, PaymentStatus::Paid),
        ("cost-002", "u-ofc1", "Crisis Intervention", 21_500, CostType::Travel, PaymentStatus::Approved),
        ("cost-003", "u-ofc2", "Interview Techniques", 89_900, CostType::Training, PaymentStatus::Pending),
        ("cost-004", "u-sgt", "Leadership Seminar", 32_000, CostType::Training, PaymentStatus::Paid),
    ];
    rows.into_iter()
        .map(|(id, user_id, title, cents, cost_type, payment_status)| CostEntry {
            id: id.to_string(),
            user_id: UserId(user_id.to_string()),
            user_name: None,
            user_badge: None,
            request_id: None,
            training_title: title.to_string(),
            amount: Decimal::new(cents, 2),
            cost_type,
            budget_code: Some("TRN-2026".to_string()),
            fiscal_year: Some("FY2026".to_string()),
            payment_status,
            notes: None,
            created_at: seed_epoch(),
        })
        .collect()
}

fn demo_invoice() -> Invoice {
    Invoice {
        id: "inv-001".to_string(),
        invoice_number: "INV-2026-0042".to_string(),
        vendor_name: Some("State Training Institute".to_string()),
        amount: Decimal::new(89_900, 2),
        invoice_date: seed_epoch(),
        due_date: Some(Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).single().unwrap_or_default()),
        status: InvoiceStatus::Received,
        description: Some("Interview Techniques registration".to_string()),
        created_at: seed_epoch(),
    }
}

fn demo_request() -> TrainingRequest {
    TrainingRequest::submit(
        RequestId("TR-demo-001".to_string()),
        UserId("u-ofc1".to_string()),
        "Riley Demo".to_string(),
        "527".to_string(),
        RequestKind::Custom {
            title: "Advanced Accident Reconstruction".to_string(),
            description: "Two-week certification course".to_string(),
            training_type: TrainingType::Individual,
            requested_date: Utc.with_ymd_and_hms(2026, 4, 6, 8, 0, 0).single().unwrap_or_default(),
            duration: "80 hours".to_string(),
            location: "State Academy".to_string(),
            estimated_cost: Decimal::new(240_000, 2),
            justification: "Traffic unit currently has no certified reconstructionist".to_string(),
        },
        Some(vec![Rank::Sergeant, Rank::Lieutenant, Rank::Commander]),
        seed_epoch(),
    )
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let users = SqlUserRepository::new(pool.clone());
        let costs = SqlCostRepository::new(pool.clone());
        let invoices = SqlInvoiceRepository::new(pool.clone());
        let requests = SqlRequestRepository::new(pool.clone());

        let roster = roster();
        for user in &roster {
            users
                .save(user.clone())
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        }
        let entries = cost_entries();
        for entry in &entries {
            costs
                .save(entry.clone())
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        }
        invoices
            .save(demo_invoice())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        requests
            .save(demo_request())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        // Read back so a partially applied seed fails loudly.
        let user_count =
            users.list().await.map_err(|error| ("seed_verification", error.to_string(), 6u8))?.len();
        let cost_count =
            costs.list().await.map_err(|error| ("seed_verification", error.to_string(), 6u8))?.len();
        if user_count < roster.len() || cost_count < entries.len() {
            return Err((
                "seed_verification",
                format!("expected {} users and {} cost entries, found {user_count} and {cost_count}",
                    roster.len(), entries.len()),
                6u8,
            ));
        }

        pool.close().await;
        Ok::<(usize, usize), (&'static str, String, u8)>((user_count, cost_count))
    });

    match result {
        Ok((user_count, cost_count)) => CommandResult::success(
            "seed",
            format!(
                "seeded demo dataset:\n  - roster: {user_count} sworn members\n  - costs: {cost_count} entries plus invoice INV-2026-0042\n  - request: TR-demo-001 (custom chain, sergeant review)"
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
