//! Flat-file renderings of a prepared report. CSV for spreadsheets that
//! import plain text, SpreadsheetML for Excel with multiple sheets.

use rust_decimal::Decimal;

use crate::domain::cost::{CostEntry, Invoice};
use crate::reports::aggregate::{OfficerCostSummary, ReportData};

/// Quotes a CSV field when it carries a comma, quote, or newline.
/// Embedded quotes are doubled per RFC 4180.
pub fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn generate_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&headers.iter().map(|h| escape_csv(h)).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in rows {
        out.push_str(&row.iter().map(|f| escape_csv(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }
    out
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub fn cost_entries_csv(entries: &[CostEntry]) -> String {
    let headers =
        ["Date", "Officer", "Badge", "Training", "Cost Type", "Amount", "Status", "Budget Code", "Notes"];
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                entry.created_at.format("%Y-%m-%d").to_string(),
                entry.user_name.clone().unwrap_or_default(),
                entry.user_badge.clone().unwrap_or_default(),
                entry.training_title.clone(),
                entry.cost_type.as_str().to_string(),
                money(entry.amount),
                entry.payment_status.as_str().to_string(),
                entry.budget_code.clone().unwrap_or_default(),
                entry.notes.clone().unwrap_or_default(),
            ]
        })
        .collect();
    generate_csv(&headers, &rows)
}

pub fn invoices_csv(invoices: &[Invoice]) -> String {
    let headers = ["Invoice #", "Vendor", "Date", "Due Date", "Amount", "Status", "Description"];
    let rows: Vec<Vec<String>> = invoices
        .iter()
        .map(|invoice| {
            vec![
                invoice.invoice_number.clone(),
                invoice.vendor_name.clone().unwrap_or_default(),
                invoice.invoice_date.format("%Y-%m-%d").to_string(),
                invoice
                    .due_date
                    .map(|due| due.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                money(invoice.amount),
                invoice.status.as_str().to_string(),
                invoice.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    generate_csv(&headers, &rows)
}

pub fn officer_summaries_csv(summaries: &[OfficerCostSummary]) -> String {
    let headers = [
        "Officer",
        "Badge",
        "Department",
        "Total Cost",
        "Pending",
        "Approved",
        "Paid",
        "Request Count",
    ];
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|summary| {
            vec![
                summary.user_name.clone(),
                summary.user_badge.clone(),
                summary.department.clone(),
                money(summary.total_cost),
                money(summary.pending_cost),
                money(summary.approved_cost),
                money(summary.paid_cost),
                summary.request_count.to_string(),
            ]
        })
        .collect();
    generate_csv(&headers, &rows)
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

enum Cell<'a> {
    Text(&'a str),
    Number(String),
}

fn sheet(name: &str, header: &[&str], rows: &[Vec<Cell<'_>>]) -> String {
    let mut xml = String::new();
    xml.push_str(&format!("<Worksheet ss:Name=\"{}\">\n<Table>\n", escape_xml(name)));
    xml.push_str("<Row>");
    for cell in header {
        xml.push_str(&format!(
            "<Cell ss:StyleID=\"Header\"><Data ss:Type=\"String\">{}</Data></Cell>",
            escape_xml(cell)
        ));
    }
    xml.push_str("</Row>\n");
    for row in rows {
        xml.push_str("<Row>");
        for cell in row {
            match cell {
                Cell::Text(text) => xml.push_str(&format!(
                    "<Cell><Data ss:Type=\"String\">{}</Data></Cell>",
                    escape_xml(text)
                )),
                Cell::Number(value) => xml.push_str(&format!(
                    "<Cell ss:StyleID=\"Money\"><Data ss:Type=\"Number\">{value}</Data></Cell>"
                )),
            }
        }
        xml.push_str("</Row>\n");
    }
    xml.push_str("</Table>\n</Worksheet>\n");
    xml
}

fn number(amount: Decimal) -> Cell<'static> {
    Cell::Number(format!("{:.2}", amount))
}

fn count(value: usize) -> Cell<'static> {
    Cell::Number(value.to_string())
}

/// A multi-sheet SpreadsheetML workbook. Excel opens this directly; the
/// format is XML so no binary writer dependency is needed.
pub fn excel_workbook(report: &ReportData) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\"?>\n\
         <?mso-application progid=\"Excel.Sheet\"?>\n\
         <Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\"\n \
         xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n\
         <Styles>\n\
         <Style ss:ID=\"Header\"><Font ss:Bold=\"1\"/></Style>\n\
         <Style ss:ID=\"Money\"><NumberFormat ss:Format=\"#,##0.00\"/></Style>\n\
         </Styles>\n",
    );

    let period = format!(
        "{} to {}",
        report.range.start.format("%Y-%m-%d"),
        report.range.end.format("%Y-%m-%d")
    );
    let utilization = format!("{:.1}%", report.budget_utilization);
    let summary_rows = vec![
        vec![Cell::Text("Report"), Cell::Text(&report.title)],
        vec![Cell::Text("Period"), Cell::Text(&period)],
        vec![Cell::Text("Fiscal Year"), Cell::Text(&report.fiscal_year)],
        vec![Cell::Text("Total Budget"), number(report.total_budget)],
        vec![Cell::Text("Total Spent"), number(report.total_spent)],
        vec![Cell::Text("Remaining"), number(report.remaining_budget)],
        vec![Cell::Text("Utilization"), Cell::Text(&utilization)],
    ];
    xml.push_str(&sheet("Summary", &["Metric", "Value"], &summary_rows));

    let dept_rows: Vec<Vec<Cell<'_>>> = report
        .spending_by_department
        .iter()
        .map(|row| {
            vec![
                Cell::Text(&row.department),
                number(row.amount),
                Cell::Number(format!("{:.1}", row.percentage)),
            ]
        })
        .collect();
    xml.push_str(&sheet("By Department", &["Department", "Amount", "Percent"], &dept_rows));

    let type_rows: Vec<Vec<Cell<'_>>> = report
        .spending_by_cost_type
        .iter()
        .map(|row| {
            vec![
                Cell::Text(&row.cost_type),
                number(row.amount),
                Cell::Number(format!("{:.1}", row.percentage)),
            ]
        })
        .collect();
    xml.push_str(&sheet("By Cost Type", &["Cost Type", "Amount", "Percent"], &type_rows));

    let trend_rows: Vec<Vec<Cell<'_>>> = report
        .monthly_trends
        .iter()
        .map(|row| vec![Cell::Text(&row.month_label), number(row.amount), count(row.count)])
        .collect();
    xml.push_str(&sheet("Monthly Trends", &["Month", "Amount", "Entries"], &trend_rows));

    let officer_rows: Vec<Vec<Cell<'_>>> = report
        .officer_summaries
        .iter()
        .map(|row| {
            vec![
                Cell::Text(&row.user_name),
                Cell::Text(&row.user_badge),
                Cell::Text(&row.department),
                number(row.total_cost),
                number(row.pending_cost),
                number(row.approved_cost),
                number(row.paid_cost),
                count(row.request_count),
            ]
        })
        .collect();
    xml.push_str(&sheet(
        "Officer Costs",
        &["Officer", "Badge", "Department", "Total", "Pending", "Approved", "Paid", "Requests"],
        &officer_rows,
    ));

    let entry_dates: Vec<String> = report
        .cost_entries
        .iter()
        .map(|entry| entry.created_at.format("%Y-%m-%d").to_string())
        .collect();
    let entry_rows: Vec<Vec<Cell<'_>>> = report
        .cost_entries
        .iter()
        .zip(entry_dates.iter())
        .map(|(entry, date)| {
            vec![
                Cell::Text(date),
                Cell::Text(entry.user_name.as_deref().unwrap_or("")),
                Cell::Text(entry.user_badge.as_deref().unwrap_or("")),
                Cell::Text(&entry.training_title),
                Cell::Text(entry.cost_type.as_str()),
                number(entry.amount),
                Cell::Text(entry.payment_status.as_str()),
                Cell::Text(entry.budget_code.as_deref().unwrap_or("")),
            ]
        })
        .collect();
    xml.push_str(&sheet(
        "Cost Entries",
        &["Date", "Officer", "Badge", "Training", "Cost Type", "Amount", "Status", "Budget Code"],
        &entry_rows,
    ));

    xml.push_str("</Workbook>\n");
    xml
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{cost_entries_csv, escape_csv, escape_xml, excel_workbook, generate_csv};
    use crate::domain::cost::{CostEntry, CostType, PaymentStatus};
    use crate::domain::user::UserId;
    use crate::reports::aggregate::prepare_report;
    use crate::reports::range::DateRange;

    #[test]
    fn plain_fields_pass_through_unquoted() {
        assert_eq!(escape_csv("Patrol"), "Patrol");
    }

    #[test]
    fn commas_quotes_and_newlines_force_quoting() {
        assert_eq!(escape_csv("Smith, Jane"), "\"Smith, Jane\"");
        assert_eq!(escape_csv("the \"long\" course"), "\"the \"\"long\"\" course\"");
        assert_eq!(escape_csv("line one\nline two"), "\"line one\nline two\"");
    }

    #[test]
    fn csv_has_header_row_and_one_line_per_record() {
        let csv = generate_csv(
            &["A", "B"],
            &[vec!["1".to_string(), "x,y".to_string()], vec!["2".to_string(), "z".to_string()]],
        );
        assert_eq!(csv, "A,B\n1,\"x,y\"\n2,z\n");
    }

    #[test]
    fn cost_entry_csv_formats_dates_and_amounts() {
        let entry = CostEntry {
            id: "c-1".to_string(),
            user_id: UserId("u-1".to_string()),
            user_name: Some("Ada Vance".to_string()),
            user_badge: Some("1001".to_string()),
            request_id: None,
            training_title: "De-escalation, Advanced".to_string(),
            amount: Decimal::new(12_550, 2),
            cost_type: CostType::Training,
            budget_code: Some("TRN-100".to_string()),
            fiscal_year: Some("2026".to_string()),
            payment_status: PaymentStatus::Paid,
            notes: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).unwrap(),
        };

        let csv = cost_entries_csv(&[entry]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Date,Officer,Badge,Training"));
        assert!(lines[1].contains("2026-03-05"));
        assert!(lines[1].contains("\"De-escalation, Advanced\""));
        assert!(lines[1].contains("125.50"));
    }

    #[test]
    fn xml_escaping_covers_the_five_predefined_entities() {
        assert_eq!(escape_xml("<a & \"b\" '>"), "&lt;a &amp; &quot;b&quot; &apos;&gt;");
    }

    #[test]
    fn workbook_contains_every_sheet() {
        let range = DateRange {
            start: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        };
        let report = prepare_report(
            "Budget & Spend",
            &[],
            &[],
            &[],
            Decimal::new(100_000, 2),
            "2026",
            range,
            Utc::now(),
        );

        let xml = excel_workbook(&report);
        for name in
            ["Summary", "By Department", "By Cost Type", "Monthly Trends", "Officer Costs", "Cost Entries"]
        {
            assert!(xml.contains(&format!("ss:Name=\"{name}\"")), "missing sheet {name}");
        }
        // The title ampersand must be entity-encoded.
        assert!(xml.contains("Budget &amp; Spend"));
    }
}
