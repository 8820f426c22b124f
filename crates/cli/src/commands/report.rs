use std::fs;

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::commands::CommandResult;
use trainhub_core::config::{AppConfig, LoadOptions};
use trainhub_core::reports::{
    cost_entries_csv, excel_workbook, prepare_report, resolve_range, DateRangeType, ReportData,
};
use trainhub_db::repositories::{
    CostRepository, InvoiceRepository, SqlCostRepository, SqlInvoiceRepository, SqlUserRepository,
    UserRepository,
};
use trainhub_db::{connect, migrations};

fn parse_range(raw: &str) -> Option<DateRangeType> {
    match raw {
        "month" => Some(DateRangeType::Month),
        "quarter" => Some(DateRangeType::Quarter),
        "year" => Some(DateRangeType::Year),
        _ => None,
    }
}

fn render(report: &ReportData, format: &str) -> Option<(String, &'static str)> {
    match format {
        "json" => serde_json::to_string_pretty(report).ok().map(|body| (body, "json")),
        "csv" => Some((cost_entries_csv(&report.cost_entries), "csv")),
        "excel" => Some((excel_workbook(report), "xls")),
        _ => None,
    }
}

pub fn run(range: &str, format: &str, output: Option<&str>) -> CommandResult {
    let Some(range_type) = parse_range(range) else {
        return CommandResult::failure(
            "report",
            "invalid_argument",
            format!("unknown range `{range}`; expected month, quarter, or year"),
            2,
        );
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "report",
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
                "report",
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

        let costs = SqlCostRepository::new(pool.clone())
            .list()
            .await
            .map_err(|error| ("report_query", error.to_string(), 5u8))?;
        let invoices = SqlInvoiceRepository::new(pool.clone())
            .list()
            .await
            .map_err(|error| ("report_query", error.to_string(), 5u8))?;
        let users = SqlUserRepository::new(pool.clone())
            .list()
            .await
            .map_err(|error| ("report_query", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>((costs, invoices, users))
    });

    let (costs, invoices, users) = match result {
        Ok(data) => data,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("report", error_class, message, exit_code);
        }
    };

    let now = Utc::now();
    let report = prepare_report(
        "Training Budget Report",
        &costs,
        &invoices,
        &users,
        Decimal::from_f64(config.budget.total_budget).unwrap_or_default(),
        config.budget.fiscal_year.clone(),
        resolve_range(range_type, None, None, now.date_naive()),
        now,
    );

    let Some((body, extension)) = render(&report, format) else {
        return CommandResult::failure(
            "report",
            "invalid_argument",
            format!("unknown format `{format}`; expected json, csv, or excel"),
            2,
        );
    };

    let path = output.map(str::to_string).unwrap_or_else(|| format!("budget-report.{extension}"));
    if let Err(error) = fs::write(&path, body) {
        return CommandResult::failure(
            "report",
            "report_write",
            format!("failed to write `{path}`: {error}"),
            7,
        );
    }

    CommandResult::success(
        "report",
        format!(
            "wrote {range} {format} report to `{path}` ({} cost entries, {} officers)",
            report.cost_entries.len(),
            report.officer_summaries.len()
        ),
    )
}
