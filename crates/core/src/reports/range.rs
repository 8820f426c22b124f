use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRangeType {
    Month,
    Quarter,
    Year,
    Custom,
}

/// Inclusive calendar window for report filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Every (year, month) pair the range touches, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut months = Vec::new();
        let (mut year, mut month) = (self.start.year(), self.start.month());
        loop {
            months.push((year, month));
            if year == self.end.year() && month == self.end.month() {
                break;
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 28).unwrap_or(NaiveDate::MIN))
}

pub fn month_bounds(year: i32, month: u32) -> DateRange {
    DateRange {
        start: NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN),
        end: last_day_of_month(year, month),
    }
}

/// Resolves a range type against `today`. Non-custom types are anchored to
/// the current period at call time, so calls across a day boundary can see a
/// different window; that is the intended "current period" semantics.
pub fn resolve_range(
    kind: DateRangeType,
    custom_start: Option<NaiveDate>,
    custom_end: Option<NaiveDate>,
    today: NaiveDate,
) -> DateRange {
    let year = today.year();
    match kind {
        DateRangeType::Month => month_bounds(year, today.month()),
        DateRangeType::Quarter => {
            let first_month = ((today.month() - 1) / 3) * 3 + 1;
            DateRange {
                start: NaiveDate::from_ymd_opt(year, first_month, 1).unwrap_or(NaiveDate::MIN),
                end: last_day_of_month(year, first_month + 2),
            }
        }
        DateRangeType::Year => DateRange {
            start: NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX),
        },
        DateRangeType::Custom => {
            let fallback = month_bounds(year, today.month());
            DateRange {
                start: custom_start.unwrap_or(fallback.start),
                end: custom_end.unwrap_or(fallback.end),
            }
        }
    }
}
