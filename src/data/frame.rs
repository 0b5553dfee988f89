use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{debug, info};

use super::aggregate::{self, Granularity, Roles};
use super::date;
use super::error::{FrameError, Result};
use super::filter::{self, Filters};
use super::forecast::{self, Splice};
use super::model::{ColumnKind, Table, Value};
use crate::config::FrameConfig;

// ---------------------------------------------------------------------------
// TimeFrame – the owned, current table plus its column roles
// ---------------------------------------------------------------------------

/// Owns the current table and the column roles it was configured with.
///
/// Transformations borrow the frame and return a new [`Table`]; the frame
/// only changes through [`reset`](Self::reset), [`commit`](Self::commit),
/// [`apply`](Self::apply), [`insert_empty_row_at`](Self::insert_empty_row_at)
/// and [`change_target`](Self::change_target). Each change bumps
/// [`version`](Self::version).
#[derive(Debug, Clone)]
pub struct TimeFrame {
    config: FrameConfig,
    table: Table,
    filter_columns: Vec<String>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    version: u64,
}

impl TimeFrame {
    /// Copy `table`, parse its date column, tag every row with the configured
    /// label and compute the date bounds.
    pub fn new(table: &Table, config: FrameConfig) -> Result<Self> {
        if config.with_graph && config.label.is_empty() {
            return Err(FrameError::Config("series label must not be empty".into()));
        }
        if config.with_graph && config.series_column.is_empty() {
            return Err(FrameError::Config("series column name must not be empty".into()));
        }

        let filter_columns = table
            .columns()
            .iter()
            .filter(|c| !config.exclude_columns_from_filter.contains(*c))
            .cloned()
            .collect();

        let normalized = normalize(table, &config)?;
        let (min_date, max_date) = date_bounds(&normalized, &config.date_column);
        info!(
            "loaded {} rows, dates {:?}..{:?}, target '{}'",
            normalized.len(),
            min_date,
            max_date,
            config.target
        );
        Ok(TimeFrame {
            config,
            table: normalized,
            filter_columns,
            min_date,
            max_date,
            version: 0,
        })
    }

    /// Replace the table with a normalized copy of `table`, keeping the
    /// configuration and the filter columns. Date bounds are recomputed.
    /// On error the frame is left untouched.
    pub fn reset(&mut self, table: &Table) -> Result<()> {
        let normalized = normalize(table, &self.config)?;
        let (min_date, max_date) = date_bounds(&normalized, &self.config.date_column);
        self.table = normalized;
        self.min_date = min_date;
        self.max_date = max_date;
        self.version += 1;
        debug!("reset to {} rows (version {})", self.table.len(), self.version);
        Ok(())
    }

    /// Switch the column that is summed and predicted.
    pub fn change_target(&mut self, target: &str) -> Result<()> {
        check_target(&self.table, target)?;
        debug!("target '{}' -> '{target}'", self.config.target);
        self.config.target = target.to_string();
        self.version += 1;
        Ok(())
    }

    /// Install `table` as the current table as-is. Date bounds and filter
    /// columns are not touched.
    pub fn commit(&mut self, table: Table) -> &Table {
        self.table = table;
        self.version += 1;
        &self.table
    }

    /// Run `op` against the frame and commit its result. Nothing changes if
    /// `op` fails.
    pub fn apply<F>(&mut self, op: F) -> Result<&Table>
    where
        F: FnOnce(&Self) -> Result<Table>,
    {
        let next = op(self)?;
        Ok(self.commit(next))
    }

    // -- accessors --

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn target(&self) -> &str {
        &self.config.target
    }

    /// Columns offered for predicate filtering.
    pub fn filter_columns(&self) -> &[String] {
        &self.filter_columns
    }

    pub fn min_date(&self) -> Option<NaiveDate> {
        self.min_date
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.max_date
    }

    /// Incremented on every change to the current table or target.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Distinct values of every filter column in the current table.
    pub fn filter_options(&self) -> BTreeMap<String, BTreeSet<Value>> {
        filter::filter_options(&self.table, &self.filter_columns)
    }

    fn roles(&self) -> Roles<'_> {
        Roles {
            date_column: &self.config.date_column,
            target: &self.config.target,
            series_column: self
                .config
                .with_graph
                .then_some(self.config.series_column.as_str()),
        }
    }

    // -- transformations --

    /// Rows passing every non-blank predicate.
    pub fn filter_by_columns(&self, filters: &Filters) -> Result<Table> {
        filter::filter_by_columns(&self.table, filters)
    }

    /// Rows dated within `start..=end`.
    pub fn filter_by_date(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        filter::filter_by_date(&self.table, &self.config.date_column, start, end)
    }

    /// One row per date with the target summed, labelled by the target name.
    pub fn aggregate(&self) -> Result<Table> {
        aggregate::aggregate_by_date(&self.table, self.roles())
    }

    /// Target sums in day, week or month buckets depending on the span.
    pub fn aggregate_by_timespan(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        let granularity = Granularity::for_range(start, end);
        debug!("span {start}..={end} uses {granularity} buckets");
        aggregate::resample(&self.table, self.roles(), granularity)
    }

    /// Insert an all-null row at `position` in the current table.
    pub fn insert_empty_row_at(&mut self, position: usize) -> Result<()> {
        let next = self.table.with_empty_row_at(position)?;
        self.commit(next);
        Ok(())
    }

    /// Forecast from the series labelled with the target name, i.e. the
    /// output of [`aggregate`](Self::aggregate) or
    /// [`aggregate_by_timespan`](Self::aggregate_by_timespan).
    ///
    /// Without series tagging the current table is returned unchanged and
    /// `predict` is never called.
    pub fn add_prediction<F>(&self, label: &str, last_n: usize, predict: F) -> Result<Table>
    where
        F: FnOnce(&Table) -> Vec<f64>,
    {
        self.add_prediction_from(&self.config.target, label, last_n, predict)
    }

    /// Forecast from the last `last_n` rows of `source_series` and append
    /// them relabelled as `label`.
    pub fn add_prediction_from<F>(
        &self,
        source_series: &str,
        label: &str,
        last_n: usize,
        predict: F,
    ) -> Result<Table>
    where
        F: FnOnce(&Table) -> Vec<f64>,
    {
        if !self.config.with_graph {
            debug!("series tagging disabled, skipping forecast '{label}'");
            return Ok(self.table.clone());
        }
        let splice = Splice {
            series_column: &self.config.series_column,
            source_series,
            label,
            target: &self.config.target,
            last_n,
        };
        forecast::splice_prediction(&self.table, splice, predict)
    }
}

/// Parse the date column and, with series tagging on, stamp the label.
fn normalize(table: &Table, config: &FrameConfig) -> Result<Table> {
    let date_column = config.date_column.as_str();
    table.kind(date_column)?;

    let series: Vec<&str> = if config.with_graph {
        vec![config.series_column.as_str()]
    } else {
        Vec::new()
    };
    let out = table.map_rows(&series, |row| {
        let cell = row.get(date_column).cloned().unwrap_or(Value::Null);
        let parsed = date::normalize(date_column, &cell)?;
        row.insert(date_column.to_string(), Value::Date(parsed));
        if config.with_graph {
            row.insert(config.series_column.clone(), Value::from(config.label.as_str()));
        }
        Ok(())
    })?;
    check_target(&out, &config.target)?;
    Ok(out)
}

fn check_target(table: &Table, target: &str) -> Result<()> {
    let kind = table.kind(target)?;
    if kind.is_numeric() || kind == ColumnKind::Empty {
        Ok(())
    } else {
        Err(FrameError::TypeMismatch {
            column: target.to_string(),
            expected: "numeric".to_string(),
            found: kind,
        })
    }
}

fn date_bounds(table: &Table, date_column: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let dates = table.column_values(date_column).filter_map(Value::as_date);
    dates.fold((None, None), |(lo, hi), d| {
        (
            Some(lo.map_or(d, |l: NaiveDate| l.min(d))),
            Some(hi.map_or(d, |h: NaiveDate| h.max(d))),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::row;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw() -> Table {
        Table::from_records(vec![
            row([("date", Value::from("20230101")), ("v", Value::Integer(10))]),
            row([("date", Value::from("20230102")), ("v", Value::Integer(20))]),
        ])
        .unwrap()
    }

    fn config() -> FrameConfig {
        FrameConfig::new("date", "v").with_label("actual")
    }

    #[test]
    fn construction_parses_labels_and_bounds() {
        let frame = TimeFrame::new(&raw(), config()).unwrap();
        let t = frame.table();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "date"), Some(&Value::Date(ymd(2023, 1, 1))));
        assert_eq!(t.get(1, "date"), Some(&Value::Date(ymd(2023, 1, 2))));
        assert!(t.column_values("graph").all(|g| g == &Value::from("actual")));
        assert_eq!(frame.min_date(), Some(ymd(2023, 1, 1)));
        assert_eq!(frame.max_date(), Some(ymd(2023, 1, 2)));
        assert_eq!(frame.filter_columns(), &["date".to_string(), "v".to_string()]);
    }

    #[test]
    fn excluded_columns_never_filterable() {
        let cfg = config().exclude_from_filter(["v", "missing"]);
        let frame = TimeFrame::new(&raw(), cfg).unwrap();
        assert_eq!(frame.filter_columns(), &["date".to_string()]);
    }

    #[test]
    fn bad_date_fails_construction() {
        let t = Table::from_records(vec![row([
            ("date", Value::from("2023-01-01")),
            ("v", Value::Integer(1)),
        ])])
        .unwrap();
        assert!(matches!(
            TimeFrame::new(&t, config()).unwrap_err(),
            FrameError::Format { .. }
        ));
    }

    #[test]
    fn missing_roles_fail_construction() {
        assert_eq!(
            TimeFrame::new(&raw(), FrameConfig::new("day", "v")).unwrap_err(),
            FrameError::UnknownColumn("day".into())
        );
        assert_eq!(
            TimeFrame::new(&raw(), FrameConfig::new("date", "units")).unwrap_err(),
            FrameError::UnknownColumn("units".into())
        );
        assert!(matches!(
            TimeFrame::new(&raw(), config().with_label("")).unwrap_err(),
            FrameError::Config(_)
        ));
    }

    #[test]
    fn without_graph_no_series_column() {
        let frame = TimeFrame::new(&raw(), config().with_graph(false)).unwrap();
        assert!(!frame.table().has_column("graph"));
        assert!(!frame.aggregate().unwrap().has_column("graph"));
    }

    #[test]
    fn reset_relabels_and_recomputes_bounds() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        let next = Table::from_records(vec![
            row([("date", Value::Integer(20240301)), ("v", Value::Integer(1))]),
            row([("date", Value::Integer(20240305)), ("v", Value::Integer(2))]),
        ])
        .unwrap();
        frame.reset(&next).unwrap();
        assert_eq!(frame.version(), 1);
        assert_eq!(frame.min_date(), Some(ymd(2024, 3, 1)));
        assert_eq!(frame.max_date(), Some(ymd(2024, 3, 5)));
        assert!(frame
            .table()
            .column_values("graph")
            .all(|g| g == &Value::from("actual")));
    }

    #[test]
    fn reset_keeps_filter_columns() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        let before = frame.filter_columns().to_vec();
        let next = Table::from_records(vec![
            row([
                ("date", Value::from("20240110")),
                ("v", Value::Integer(1)),
                ("store", Value::from("A7")),
            ]),
            row([
                ("date", Value::from("20240102")),
                ("v", Value::Integer(2)),
                ("store", Value::from("B1")),
            ]),
        ])
        .unwrap();
        frame.reset(&next).unwrap();
        assert_eq!(frame.filter_columns(), before.as_slice());
        assert!(!frame.filter_options().contains_key("store"));
        assert_eq!(frame.min_date(), Some(ymd(2024, 1, 2)));
        assert_eq!(frame.max_date(), Some(ymd(2024, 1, 10)));
    }

    #[test]
    fn failed_reset_leaves_frame_untouched() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        let before = frame.table().clone();
        let bad = Table::from_records(vec![row([
            ("date", Value::from("tomorrow")),
            ("v", Value::Integer(1)),
        ])])
        .unwrap();
        assert!(frame.reset(&bad).is_err());
        assert_eq!(frame.table(), &before);
        assert_eq!(frame.version(), 0);
    }

    #[test]
    fn change_target_validates() {
        let t = Table::from_records(vec![row([
            ("date", Value::from("20230101")),
            ("v", Value::Integer(1)),
            ("w", Value::Float(2.0)),
            ("name", Value::from("a")),
        ])])
        .unwrap();
        let mut frame = TimeFrame::new(&t, config()).unwrap();
        frame.change_target("w").unwrap();
        assert_eq!(frame.target(), "w");
        assert!(frame.change_target("name").is_err());
        assert!(frame.change_target("nope").is_err());
        assert_eq!(frame.target(), "w");
    }

    #[test]
    fn transformations_do_not_mutate_until_applied() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        let agg = frame.aggregate().unwrap();
        assert_eq!(frame.table().get(0, "graph"), Some(&Value::from("actual")));
        assert_eq!(agg.get(0, "graph"), Some(&Value::from("v")));

        frame.apply(|f| f.filter_by_date(ymd(2023, 1, 2), ymd(2023, 1, 2))).unwrap();
        assert_eq!(frame.table().len(), 1);
        assert_eq!(frame.version(), 1);
        // bounds follow wholesale replacement only
        assert_eq!(frame.min_date(), Some(ymd(2023, 1, 1)));
    }

    #[test]
    fn insert_row_commits_and_checks_range() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        frame.insert_empty_row_at(1).unwrap();
        assert_eq!(frame.table().len(), 3);
        assert_eq!(frame.table().get(1, "v"), Some(&Value::Null));
        let before = frame.table().clone();
        assert_eq!(
            frame.insert_empty_row_at(4).unwrap_err(),
            FrameError::Index { position: 4, len: 3 }
        );
        assert_eq!(frame.table(), &before);
    }

    #[test]
    fn prediction_requires_aggregated_series() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        // Nothing is labelled "v" yet, so the window is empty.
        let out = frame.add_prediction("fc", 2, |w| vec![0.0; w.len()]).unwrap();
        assert_eq!(out.len(), 2);

        frame.apply(TimeFrame::aggregate).unwrap();
        let out = frame.add_prediction("fc", 2, |w| vec![1.0; w.len()]).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out.get(3, "graph"), Some(&Value::from("fc")));
    }

    #[test]
    fn explicit_source_series() {
        let frame = TimeFrame::new(&raw(), config()).unwrap();
        let out = frame
            .add_prediction_from("actual", "fc", 1, |w| vec![5.0; w.len()])
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.get(2, "v"), Some(&Value::Float(5.0)));
    }

    #[test]
    fn contract_violation_leaves_frame_unchanged() {
        let mut frame = TimeFrame::new(&raw(), config()).unwrap();
        frame.apply(TimeFrame::aggregate).unwrap();
        let before = frame.table().clone();
        let version = frame.version();
        let err = frame
            .apply(|f| f.add_prediction("fc", 2, |_| vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::Contract {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(frame.table(), &before);
        assert_eq!(frame.version(), version);
    }

    #[test]
    fn no_graph_prediction_is_a_no_op() {
        let frame = TimeFrame::new(&raw(), config().with_graph(false)).unwrap();
        let mut called = false;
        let out = frame
            .add_prediction("fc", 5, |_| {
                called = true;
                Vec::new()
            })
            .unwrap();
        assert!(!called);
        assert_eq!(&out, frame.table());
    }
}
