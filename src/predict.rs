//! Simple built-in predictors for the forecast splicer.
//!
//! The engine treats prediction as a black box (`FnOnce(&Table) -> Vec<f64>`);
//! these exist so the command line has something to inject. Each returns one
//! value per window row.

use clap::ValueEnum;

use crate::data::model::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Predictor {
    /// Each row takes the previous row's value.
    Naive,
    /// Every row takes the window mean.
    Mean,
    /// Ordinary least squares line over row position.
    Linear,
}

impl Predictor {
    /// Predict `target` for every row of `window`. Null cells are ignored
    /// when fitting.
    pub fn predict(self, window: &Table, target: &str) -> Vec<f64> {
        let values: Vec<Option<f64>> = window.column_values(target).map(|v| v.as_f64()).collect();
        match self {
            Predictor::Naive => naive(&values),
            Predictor::Mean => {
                let m = mean(values.iter().flatten().copied()).unwrap_or(0.0);
                vec![m; values.len()]
            }
            Predictor::Linear => linear(&values),
        }
    }
}

fn naive(values: &[Option<f64>]) -> Vec<f64> {
    let mut last = values.iter().flatten().copied().next().unwrap_or(0.0);
    values
        .iter()
        .map(|v| {
            let out = last;
            if let Some(v) = v {
                last = *v;
            }
            out
        })
        .collect()
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Fit `y = a + b x` with `x` the row position.
fn linear(values: &[Option<f64>]) -> Vec<f64> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|y| (i as f64, y)))
        .collect();
    let (Some(mx), Some(my)) = (
        mean(points.iter().map(|p| p.0)),
        mean(points.iter().map(|p| p.1)),
    ) else {
        return vec![0.0; values.len()];
    };
    let sxx: f64 = points.iter().map(|(x, _)| (x - mx).powi(2)).sum();
    let sxy: f64 = points.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = my - slope * mx;
    (0..values.len())
        .map(|i| intercept + slope * i as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{row, Value};

    fn window(vals: &[Value]) -> Table {
        Table::from_records(vals.iter().map(|v| row([("v", v.clone())])).collect()).unwrap()
    }

    #[test]
    fn naive_shifts_by_one() {
        let w = window(&[Value::Float(1.0), Value::Float(2.0), Value::Float(4.0)]);
        assert_eq!(Predictor::Naive.predict(&w, "v"), vec![1.0, 1.0, 2.0]);
    }

    #[test]
    fn mean_fills_window() {
        let w = window(&[Value::Integer(1), Value::Null, Value::Integer(3)]);
        assert_eq!(Predictor::Mean.predict(&w, "v"), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn linear_recovers_line() {
        let w = window(&[Value::Float(2.0), Value::Float(5.0), Value::Float(8.0)]);
        let got = Predictor::Linear.predict(&w, "v");
        for (g, want) in got.iter().zip([2.0, 5.0, 8.0]) {
            assert!((g - want).abs() < 1e-10);
        }
    }

    #[test]
    fn output_length_matches_window() {
        let empty = window(&[]);
        for p in [Predictor::Naive, Predictor::Mean, Predictor::Linear] {
            assert!(p.predict(&empty, "v").is_empty());
        }
    }
}
