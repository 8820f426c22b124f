pub mod aggregate;
pub mod export;
pub mod range;

pub use aggregate::{
    filter_by_range, monthly_trend, officer_summaries, prepare_report, spending_by_cost_type,
    spending_by_department, CostTypeSpending, DepartmentSpending, MonthlyTrend,
    OfficerCostSummary, ReportData,
};
pub use export::{
    cost_entries_csv, escape_csv, escape_xml, excel_workbook, generate_csv, invoices_csv,
    officer_summaries_csv,
};
pub use range::{last_day_of_month, month_bounds, resolve_range, DateRange, DateRangeType};
