//! Pure, stateless aggregation over cost records. Safe to re-run on every
//! filter change; no I/O and no clock reads happen here.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cost::{CostEntry, Invoice, PaymentStatus};
use crate::domain::user::User;
use crate::reports::range::{month_bounds, DateRange};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepartmentSpending {
    pub department: String,
    pub amount: Decimal,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostTypeSpending {
    pub cost_type: String,
    pub amount: Decimal,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// Sort key, `YYYY-MM`.
    pub month: String,
    /// Display label, e.g. `Mar 2026`.
    pub month_label: String,
    pub amount: Decimal,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfficerCostSummary {
    pub user_id: String,
    pub user_name: String,
    pub user_badge: String,
    pub department: String,
    pub total_cost: Decimal,
    pub pending_cost: Decimal,
    pub approved_cost: Decimal,
    pub paid_cost: Decimal,
    pub request_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub range: DateRange,
    pub fiscal_year: String,
    pub total_budget: Decimal,
    pub total_spent: Decimal,
    pub remaining_budget: Decimal,
    pub budget_utilization: f64,
    pub spending_by_department: Vec<DepartmentSpending>,
    pub spending_by_cost_type: Vec<CostTypeSpending>,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub officer_summaries: Vec<OfficerCostSummary>,
    pub cost_entries: Vec<CostEntry>,
    pub invoices: Vec<Invoice>,
}

fn entry_date(entry: &CostEntry) -> NaiveDate {
    entry.created_at.date_naive()
}

/// Keeps entries whose creation date falls inside the inclusive window.
pub fn filter_by_range<'a>(costs: &'a [CostEntry], range: &DateRange) -> Vec<&'a CostEntry> {
    costs.iter().filter(|cost| range.contains(entry_date(cost))).collect()
}

fn percentage_of(amount: Decimal, total: Decimal) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (amount / total * Decimal::from(100)).to_f64().unwrap_or(0.0)
}

/// Spending grouped by the owning officer's department, descending by amount.
/// Officers missing from the roster fall into "Unknown".
pub fn spending_by_department(costs: &[&CostEntry], users: &[User]) -> Vec<DepartmentSpending> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for cost in costs {
        let department = users
            .iter()
            .find(|user| user.id == cost.user_id)
            .map(|user| user.department.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        *totals.entry(department).or_insert(Decimal::ZERO) += cost.amount;
    }

    let total: Decimal = totals.values().copied().sum();
    let mut rows: Vec<DepartmentSpending> = totals
        .into_iter()
        .map(|(department, amount)| DepartmentSpending {
            department,
            amount,
            percentage: percentage_of(amount, total),
        })
        .collect();
    rows.sort_by(|a, b| b.amount.cmp(&a.amount));
    rows
}

pub fn spending_by_cost_type(costs: &[&CostEntry]) -> Vec<CostTypeSpending> {
    let mut totals: BTreeMap<&'static str, Decimal> = BTreeMap::new();
    for cost in costs {
        *totals.entry(cost.cost_type.as_str()).or_insert(Decimal::ZERO) += cost.amount;
    }

    let total: Decimal = totals.values().copied().sum();
    let mut rows: Vec<CostTypeSpending> = totals
        .into_iter()
        .map(|(cost_type, amount)| CostTypeSpending {
            cost_type: cost_type.to_string(),
            amount,
            percentage: percentage_of(amount, total),
        })
        .collect();
    rows.sort_by(|a, b| b.amount.cmp(&a.amount));
    rows
}

/// Buckets by calendar month across every month in the range. Callers pass
/// the unfiltered record set so the trend shows history, not the filtered
/// subset used by the other tables.
pub fn monthly_trend(costs: &[CostEntry], range: &DateRange) -> Vec<MonthlyTrend> {
    range
        .months()
        .into_iter()
        .map(|(year, month)| {
            let bounds = month_bounds(year, month);
            let in_month: Vec<&CostEntry> =
                costs.iter().filter(|cost| bounds.contains(entry_date(cost))).collect();
            MonthlyTrend {
                month: format!("{year:04}-{month:02}"),
                month_label: bounds.start.format("%b %Y").to_string(),
                amount: in_month.iter().map(|cost| cost.amount).sum(),
                count: in_month.len(),
            }
        })
        .collect()
}

/// Per-officer totals split by payment status, descending by total cost.
pub fn officer_summaries(costs: &[&CostEntry], users: &[User]) -> Vec<OfficerCostSummary> {
    let mut summaries: BTreeMap<String, OfficerCostSummary> = BTreeMap::new();

    for cost in costs {
        let user = users.iter().find(|user| user.id == cost.user_id);
        let summary = summaries.entry(cost.user_id.0.clone()).or_insert_with(|| {
            OfficerCostSummary {
                user_id: cost.user_id.0.clone(),
                user_name: cost
                    .user_name
                    .clone()
                    .or_else(|| user.map(User::full_name))
                    .unwrap_or_else(|| "Unknown".to_string()),
                user_badge: cost
                    .user_badge
                    .clone()
                    .or_else(|| user.map(|u| u.badge_number.clone()))
                    .unwrap_or_default(),
                department: user
                    .map(|u| u.department.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                total_cost: Decimal::ZERO,
                pending_cost: Decimal::ZERO,
                approved_cost: Decimal::ZERO,
                paid_cost: Decimal::ZERO,
                request_count: 0,
            }
        });

        summary.total_cost += cost.amount;
        summary.request_count += 1;
        match cost.payment_status {
            PaymentStatus::Pending => summary.pending_cost += cost.amount,
            PaymentStatus::Approved => summary.approved_cost += cost.amount,
            PaymentStatus::Paid => summary.paid_cost += cost.amount,
            PaymentStatus::Rejected => {}
        }
    }

    let mut rows: Vec<OfficerCostSummary> = summaries.into_values().collect();
    rows.sort_by(|a, b| b.total_cost.cmp(&a.total_cost));
    rows
}

#[allow(clippy::too_many_arguments)]
pub fn prepare_report(
    title: impl Into<String>,
    costs: &[CostEntry],
    invoices: &[Invoice],
    users: &[User],
    total_budget: Decimal,
    fiscal_year: impl Into<String>,
    range: DateRange,
    generated_at: DateTime<Utc>,
) -> ReportData {
    let filtered = filter_by_range(costs, &range);
    let total_spent: Decimal = filtered.iter().map(|cost| cost.amount).sum();
    let budget_utilization = if total_budget.is_zero() {
        0.0
    } else {
        (total_spent / total_budget * Decimal::from(100)).to_f64().unwrap_or(0.0)
    };

    let mut cost_entries: Vec<CostEntry> = filtered.iter().map(|cost| (*cost).clone()).collect();
    cost_entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    ReportData {
        title: title.into(),
        generated_at,
        range,
        fiscal_year: fiscal_year.into(),
        total_budget,
        total_spent,
        remaining_budget: total_budget - total_spent,
        budget_utilization,
        spending_by_department: spending_by_department(&filtered, users),
        spending_by_cost_type: spending_by_cost_type(&filtered),
        // Trends run over the full history on purpose.
        monthly_trends: monthly_trend(costs, &range),
        officer_summaries: officer_summaries(&filtered, users),
        cost_entries,
        invoices: invoices.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        filter_by_range, monthly_trend, officer_summaries, prepare_report, spending_by_cost_type,
        spending_by_department,
    };
    use crate::domain::cost::{CostEntry, CostType, PaymentStatus};
    use crate::domain::user::{Role, User, UserId};
    use crate::reports::range::{resolve_range, DateRange, DateRangeType};

    fn cost(
        id: &str,
        user: &str,
        amount: i64,
        cost_type: CostType,
        status: PaymentStatus,
        y: i32,
        m: u32,
        d: u32,
    ) -> CostEntry {
        CostEntry {
            id: id.to_string(),
            user_id: UserId(user.to_string()),
            user_name: None,
            user_badge: None,
            request_id: None,
            training_title: "Firearms Requalification".to_string(),
            amount: Decimal::new(amount, 2),
            cost_type,
            budget_code: Some("TRN-100".to_string()),
            fiscal_year: Some("2026".to_string()),
            payment_status: status,
            notes: None,
            created_at: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
        }
    }

    fn roster() -> Vec<User> {
        let make = |id: &str, first: &str, department: &str, badge: &str| User {
            id: UserId(id.to_string()),
            badge_number: badge.to_string(),
            first_name: first.to_string(),
            last_name: "Vance".to_string(),
            email: format!("{first}@pd.example"),
            role: Role::Officer,
            department: department.to_string(),
            rank: "Officer".to_string(),
            supervisor_id: None,
            platoon: None,
        };
        vec![make("u-1", "Ada", "Patrol", "1001"), make("u-2", "Ben", "Detectives", "1002")]
    }

    #[test]
    fn filter_keeps_month_boundaries_and_drops_the_previous_month() {
        let today = chrono::NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let range = resolve_range(DateRangeType::Month, None, None, today);
        let costs = vec![
            cost("c-1", "u-1", 10_000, CostType::Training, PaymentStatus::Paid, 2026, 3, 1),
            cost("c-2", "u-1", 20_000, CostType::Training, PaymentStatus::Paid, 2026, 2, 28),
            cost("c-3", "u-1", 30_000, CostType::Training, PaymentStatus::Paid, 2026, 3, 31),
        ];

        let kept = filter_by_range(&costs, &range);
        let ids: Vec<&str> = kept.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-1", "c-3"]);
    }

    #[test]
    fn percentages_sum_to_one_hundred_when_total_is_positive() {
        let costs = vec![
            cost("c-1", "u-1", 30_000, CostType::Training, PaymentStatus::Paid, 2026, 3, 1),
            cost("c-2", "u-1", 20_000, CostType::Travel, PaymentStatus::Paid, 2026, 3, 2),
            cost("c-3", "u-2", 50_000, CostType::Overtime, PaymentStatus::Paid, 2026, 3, 3),
        ];
        let refs: Vec<&CostEntry> = costs.iter().collect();

        let by_type = spending_by_cost_type(&refs);
        let sum: f64 = by_type.iter().map(|row| row.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9, "percentages summed to {sum}");
        assert_eq!(by_type[0].cost_type, "overtime", "sorted descending by amount");
    }

    #[test]
    fn percentages_are_zero_when_total_is_zero() {
        let costs = vec![
            cost("c-1", "u-1", 0, CostType::Training, PaymentStatus::Pending, 2026, 3, 1),
            cost("c-2", "u-2", 0, CostType::Travel, PaymentStatus::Pending, 2026, 3, 2),
        ];
        let refs: Vec<&CostEntry> = costs.iter().collect();

        for row in spending_by_cost_type(&refs) {
            assert_eq!(row.percentage, 0.0);
        }
        for row in spending_by_department(&refs, &roster()) {
            assert_eq!(row.percentage, 0.0);
        }
    }

    #[test]
    fn unknown_officers_group_into_an_unknown_department() {
        let costs =
            vec![cost("c-1", "u-ghost", 10_000, CostType::Other, PaymentStatus::Paid, 2026, 3, 1)];
        let refs: Vec<&CostEntry> = costs.iter().collect();

        let rows = spending_by_department(&refs, &roster());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].department, "Unknown");
    }

    #[test]
    fn monthly_trend_emits_every_month_including_empty_ones() {
        let range = DateRange {
            start: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        };
        let costs = vec![
            cost("c-1", "u-1", 10_000, CostType::Training, PaymentStatus::Paid, 2026, 1, 15),
            cost("c-2", "u-1", 20_000, CostType::Training, PaymentStatus::Paid, 2026, 3, 5),
            cost("c-3", "u-1", 40_000, CostType::Training, PaymentStatus::Paid, 2026, 3, 9),
        ];

        let trend = monthly_trend(&costs, &range);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].month, "2026-01");
        assert_eq!(trend[1].count, 0);
        assert_eq!(trend[1].amount, Decimal::ZERO);
        assert_eq!(trend[2].amount, Decimal::new(60_000, 2));
        assert_eq!(trend[2].month_label, "Mar 2026");
    }

    #[test]
    fn officer_summaries_split_totals_by_payment_status() {
        let costs = vec![
            cost("c-1", "u-1", 10_000, CostType::Training, PaymentStatus::Pending, 2026, 3, 1),
            cost("c-2", "u-1", 20_000, CostType::Travel, PaymentStatus::Paid, 2026, 3, 2),
            cost("c-3", "u-2", 5_000, CostType::Other, PaymentStatus::Approved, 2026, 3, 3),
            cost("c-4", "u-1", 1_000, CostType::Other, PaymentStatus::Rejected, 2026, 3, 4),
        ];
        let refs: Vec<&CostEntry> = costs.iter().collect();

        let rows = officer_summaries(&refs, &roster());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "u-1", "largest spender first");
        assert_eq!(rows[0].total_cost, Decimal::new(31_000, 2));
        assert_eq!(rows[0].pending_cost, Decimal::new(10_000, 2));
        assert_eq!(rows[0].paid_cost, Decimal::new(20_000, 2));
        assert_eq!(rows[0].request_count, 3);
        assert_eq!(rows[1].approved_cost, Decimal::new(5_000, 2));
    }

    #[test]
    fn prepared_report_computes_budget_utilization_from_the_filtered_window() {
        let range = DateRange {
            start: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        };
        let costs = vec![
            cost("c-1", "u-1", 25_000, CostType::Training, PaymentStatus::Paid, 2026, 3, 10),
            // Outside the window; excluded from totals and tables.
            cost("c-2", "u-1", 75_000, CostType::Travel, PaymentStatus::Paid, 2026, 2, 10),
        ];

        let report = prepare_report(
            "Quarterly Budget",
            &costs,
            &[],
            &roster(),
            Decimal::new(100_000, 2),
            "2026",
            range,
            Utc::now(),
        );

        assert_eq!(report.total_spent, Decimal::new(25_000, 2));
        assert_eq!(report.remaining_budget, Decimal::new(75_000, 2));
        assert!((report.budget_utilization - 25.0).abs() < 1e-9);
        assert_eq!(report.cost_entries.len(), 1);
        assert_eq!(report.monthly_trends.len(), 1);
        assert_eq!(report.monthly_trends[0].amount, Decimal::new(25_000, 2));
    }
}
