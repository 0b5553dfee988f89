//! Date-keyed aggregation and adaptive time-bucket resampling.
//!
//! Both operations sum the target column and label the result series with
//! the target column's own name, marking it as a total.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use log::{debug, warn};

use super::error::{FrameError, Result};
use super::model::{ColumnKind, Row, Table, Value};

/// Spans longer than this many days are bucketed by month.
pub const MONTHLY_ABOVE_DAYS: i64 = 365;
/// Spans longer than this many days (up to the monthly limit) go weekly.
pub const WEEKLY_ABOVE_DAYS: i64 = 90;

/// Column roles shared by both aggregations.
#[derive(Debug, Clone, Copy)]
pub struct Roles<'a> {
    pub date_column: &'a str,
    pub target: &'a str,
    /// Series column to stamp with the target name, if series tagging is on.
    pub series_column: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Granularity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => f.write_str("daily"),
            Granularity::Week => f.write_str("weekly"),
            Granularity::Month => f.write_str("monthly"),
        }
    }
}

impl Granularity {
    /// Pick a bucket size that keeps the number of plotted points bounded.
    pub fn for_span(days: i64) -> Self {
        if days > MONTHLY_ABOVE_DAYS {
            Granularity::Month
        } else if days > WEEKLY_ABOVE_DAYS {
            Granularity::Week
        } else {
            Granularity::Day
        }
    }

    /// Granularity for the range `start..=end`, measured as `end - start`.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self::for_span((end - start).num_days())
    }

    /// The label date of the bucket containing `date`.
    ///
    /// Days label themselves, weeks run Monday to Sunday and are labelled by
    /// their Sunday, months are labelled by their last day.
    pub fn anchor(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                let to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
                date + Duration::days(to_sunday)
            }
            Granularity::Month => {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|first| first.pred_opt())
                    .unwrap_or(date)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Summation
// ---------------------------------------------------------------------------

/// Running sum that stays integral for integer targets.
#[derive(Debug, Clone, Copy)]
enum Sum {
    Int(i64),
    Float(f64),
}

impl Sum {
    fn zero(kind: ColumnKind) -> Self {
        if kind == ColumnKind::Integer {
            Sum::Int(0)
        } else {
            Sum::Float(0.0)
        }
    }

    /// An integer sum that would overflow continues as a float.
    fn add(&mut self, value: &Value) {
        *self = match (*self, value) {
            (Sum::Int(acc), Value::Integer(i)) => match acc.checked_add(*i) {
                Some(total) => Sum::Int(total),
                None => {
                    warn!("integer sum overflowed at {acc} + {i}, widening to float");
                    Sum::Float(acc as f64 + *i as f64)
                }
            },
            (Sum::Float(acc), v) => Sum::Float(acc + v.as_f64().unwrap_or(0.0)),
            // Null cells contribute nothing.
            (sum, _) => sum,
        };
    }

    fn into_value(self) -> Value {
        match self {
            Sum::Int(i) => Value::Integer(i),
            Sum::Float(f) => Value::Float(f),
        }
    }
}

fn numeric_target(table: &Table, target: &str) -> Result<ColumnKind> {
    let kind = table.kind(target)?;
    if kind.is_numeric() || kind == ColumnKind::Empty {
        Ok(kind)
    } else {
        Err(FrameError::TypeMismatch {
            column: target.to_string(),
            expected: "numeric".to_string(),
            found: kind,
        })
    }
}

fn sum_by<F>(table: &Table, roles: Roles<'_>, mut key: F) -> Result<Table>
where
    F: FnMut(NaiveDate) -> NaiveDate,
{
    let kind = numeric_target(table, roles.target)?;
    table.kind(roles.date_column)?;

    let mut buckets: BTreeMap<NaiveDate, Sum> = BTreeMap::new();
    for row in table.rows() {
        let Some(date) = row.get(roles.date_column).and_then(Value::as_date) else {
            continue;
        };
        let cell = row.get(roles.target).unwrap_or(&Value::Null);
        buckets
            .entry(key(date))
            .or_insert_with(|| Sum::zero(kind))
            .add(cell);
    }

    let mut columns = vec![roles.date_column.to_string(), roles.target.to_string()];
    if let Some(series) = roles.series_column {
        columns.push(series.to_string());
    }
    let rows: Vec<Row> = buckets
        .into_iter()
        .map(|(date, sum)| {
            let mut out = Row::new();
            out.insert(roles.date_column.to_string(), Value::Date(date));
            out.insert(roles.target.to_string(), sum.into_value());
            if let Some(series) = roles.series_column {
                out.insert(series.to_string(), Value::from(roles.target));
            }
            out
        })
        .collect();
    Table::new(columns, rows)
}

/// Collapse rows sharing a date, summing the target. One row per distinct
/// date, ascending. Rows without a date are dropped.
pub fn aggregate_by_date(table: &Table, roles: Roles<'_>) -> Result<Table> {
    let out = sum_by(table, roles, |d| d)?;
    debug!(
        "aggregated '{}' by '{}': {} -> {} rows",
        roles.target,
        roles.date_column,
        table.len(),
        out.len()
    );
    Ok(out)
}

/// Sum the target into `granularity` buckets. Only populated buckets are
/// emitted, ascending by anchor date.
pub fn resample(table: &Table, roles: Roles<'_>, granularity: Granularity) -> Result<Table> {
    let out = sum_by(table, roles, |d| granularity.anchor(d))?;
    debug!(
        "resampled '{}' {granularity}: {} -> {} rows",
        roles.target,
        table.len(),
        out.len()
    );
    Ok(out)
}

/// Resample with a granularity chosen from the span `start..=end`.
///
/// The range only selects the bucket size; the whole table is bucketed.
pub fn aggregate_by_timespan(
    table: &Table,
    roles: Roles<'_>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Table> {
    resample(table, roles, Granularity::for_range(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::row;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const ROLES: Roles<'static> = Roles {
        date_column: "date",
        target: "v",
        series_column: Some("graph"),
    };

    fn table(cells: &[(NaiveDate, Value)]) -> Table {
        Table::from_records(
            cells
                .iter()
                .map(|(d, v)| {
                    row([
                        ("date", Value::Date(*d)),
                        ("v", v.clone()),
                        ("graph", Value::from("actual")),
                    ])
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn sums_per_date_ascending() {
        let d1 = ymd(2023, 1, 1);
        let d2 = ymd(2023, 1, 2);
        let t = table(&[
            (d2, Value::Integer(2)),
            (d1, Value::Integer(5)),
            (d1, Value::Integer(3)),
        ]);
        let out = aggregate_by_date(&t, ROLES).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0, "date"), Some(&Value::Date(d1)));
        assert_eq!(out.get(0, "v"), Some(&Value::Integer(8)));
        assert_eq!(out.get(1, "date"), Some(&Value::Date(d2)));
        assert_eq!(out.get(1, "v"), Some(&Value::Integer(2)));
        assert!(out.column_values("graph").all(|g| g == &Value::from("v")));
    }

    #[test]
    fn float_sums_skip_nulls_and_undated_rows() {
        let d1 = ymd(2023, 1, 1);
        let t = table(&[(d1, Value::Float(1.5)), (d1, Value::Null)])
            .with_empty_row_at(1)
            .unwrap();
        let out = aggregate_by_date(&t, ROLES).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(0, "v"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn overflowing_integer_sum_widens_to_float() {
        let d1 = ymd(2023, 1, 1);
        let d2 = ymd(2023, 1, 2);
        let t = table(&[
            (d1, Value::Integer(i64::MAX)),
            (d1, Value::Integer(1)),
            (d1, Value::Integer(1)),
            (d2, Value::Integer(4)),
        ]);
        let out = aggregate_by_date(&t, ROLES).unwrap();
        assert_eq!(out.kind("v").unwrap(), ColumnKind::Float);
        assert_eq!(out.get(0, "v"), Some(&Value::Float(i64::MAX as f64 + 2.0)));
        assert_eq!(out.get(1, "v"), Some(&Value::Integer(4)));
    }

    #[test]
    fn no_series_column_without_graph() {
        let t = table(&[(ymd(2023, 1, 1), Value::Integer(1))]);
        let roles = Roles {
            series_column: None,
            ..ROLES
        };
        let out = aggregate_by_date(&t, roles).unwrap();
        assert_eq!(out.columns(), &["date".to_string(), "v".to_string()]);
    }

    #[test]
    fn text_target_is_rejected() {
        let t = table(&[(ymd(2023, 1, 1), Value::Integer(1))]);
        let roles = Roles {
            target: "graph",
            ..ROLES
        };
        assert!(matches!(
            aggregate_by_date(&t, roles).unwrap_err(),
            FrameError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn bucket_thresholds() {
        let start = ymd(2022, 1, 1);
        let at = |days| Granularity::for_range(start, start + Duration::days(days));
        assert_eq!(at(366), Granularity::Month);
        assert_eq!(at(365), Granularity::Week);
        assert_eq!(at(91), Granularity::Week);
        assert_eq!(at(90), Granularity::Day);
        assert_eq!(at(0), Granularity::Day);
    }

    #[test]
    fn anchors() {
        // 2023-03-15 is a Wednesday.
        let wed = ymd(2023, 3, 15);
        assert_eq!(Granularity::Day.anchor(wed), wed);
        assert_eq!(Granularity::Week.anchor(wed), ymd(2023, 3, 19));
        assert_eq!(Granularity::Week.anchor(ymd(2023, 3, 19)), ymd(2023, 3, 19));
        assert_eq!(Granularity::Week.anchor(ymd(2023, 3, 20)), ymd(2023, 3, 26));
        assert_eq!(Granularity::Month.anchor(wed), ymd(2023, 3, 31));
        assert_eq!(Granularity::Month.anchor(ymd(2024, 2, 3)), ymd(2024, 2, 29));
        assert_eq!(Granularity::Month.anchor(ymd(2023, 12, 1)), ymd(2023, 12, 31));
    }

    #[test]
    fn monthly_resample_omits_empty_buckets() {
        let t = table(&[
            (ymd(2023, 1, 5), Value::Integer(1)),
            (ymd(2023, 1, 20), Value::Integer(2)),
            (ymd(2023, 4, 2), Value::Integer(7)),
        ]);
        let out =
            aggregate_by_timespan(&t, ROLES, ymd(2022, 1, 1), ymd(2023, 12, 31)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0, "date"), Some(&Value::Date(ymd(2023, 1, 31))));
        assert_eq!(out.get(0, "v"), Some(&Value::Integer(3)));
        assert_eq!(out.get(1, "date"), Some(&Value::Date(ymd(2023, 4, 30))));
        assert_eq!(out.get(1, "graph"), Some(&Value::from("v")));
    }

    #[test]
    fn weekly_resample_groups_monday_to_sunday() {
        let t = table(&[
            (ymd(2023, 3, 13), Value::Integer(1)), // Monday
            (ymd(2023, 3, 19), Value::Integer(1)), // Sunday
            (ymd(2023, 3, 20), Value::Integer(4)), // next Monday
        ]);
        let out = resample(&t, ROLES, Granularity::Week).unwrap();
        let sums: Vec<_> = out.column_values("v").cloned().collect();
        assert_eq!(sums, vec![Value::Integer(2), Value::Integer(4)]);
    }
}
