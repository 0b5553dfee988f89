//! Forecast splicing: predict over the tail of one series and append the
//! result as a new series.

use log::{debug, info};

use super::error::{FrameError, Result};
use super::model::{Table, Value};

/// Where the forecast window comes from and how the result is labelled.
#[derive(Debug, Clone, Copy)]
pub struct Splice<'a> {
    pub series_column: &'a str,
    /// Label of the rows the window is taken from.
    pub source_series: &'a str,
    /// Label stamped on the appended rows.
    pub label: &'a str,
    pub target: &'a str,
    /// Maximum window length.
    pub last_n: usize,
}

/// Take the last `last_n` rows of `source_series`, overwrite `target` with
/// `predict(window)`, relabel them `label` and append them to `table`.
///
/// `predict` must return one value per window row, in window order. A
/// window shorter than `last_n` (short series) expects that many values.
pub fn splice_prediction<F>(table: &Table, splice: Splice<'_>, predict: F) -> Result<Table>
where
    F: FnOnce(&Table) -> Vec<f64>,
{
    if splice.label.is_empty() {
        return Err(FrameError::Config("forecast label must not be empty".into()));
    }
    table.kind(splice.series_column)?;
    table.kind(splice.target)?;

    let window = table.tail_where(splice.last_n, |row| {
        row.get(splice.series_column)
            .and_then(Value::as_str)
            .is_some_and(|s| s == splice.source_series)
    });
    debug!(
        "forecast window: {} of {} requested rows from series '{}'",
        window.len(),
        splice.last_n,
        splice.source_series
    );

    let predicted = predict(&window);
    if predicted.len() != window.len() {
        return Err(FrameError::Contract {
            expected: window.len(),
            actual: predicted.len(),
        });
    }

    let rows = window
        .rows()
        .iter()
        .zip(predicted)
        .map(|(row, value)| {
            let mut row = row.clone();
            row.insert(splice.target.to_string(), Value::Float(value));
            row.insert(splice.series_column.to_string(), Value::from(splice.label));
            row
        })
        .collect();
    let out = table.appended(rows)?;
    info!(
        "spliced {} '{}' rows onto {} existing rows",
        window.len(),
        splice.label,
        table.len()
    );
    Ok(out)
}
