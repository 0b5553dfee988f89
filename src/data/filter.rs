use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::debug;

use super::error::{FrameError, Result};
use super::model::{ColumnKind, Table, Value};

// ---------------------------------------------------------------------------
// Filter predicate: which values are accepted per column
// ---------------------------------------------------------------------------

/// Constraint on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// No constraint.
    Any,
    /// Cell must equal the value.
    Eq(Value),
    /// Cell must equal one of the values.
    In(BTreeSet<Value>),
}

impl Predicate {
    /// Blank predicates (`Any`, `Null`, `""`, a set of only blanks) are
    /// skipped rather than excluding every row.
    pub fn is_unconstrained(&self) -> bool {
        self.values().next().is_none()
    }

    /// Blank set members are ignored, like blank scalars.
    fn accepts(&self, cell: &Value) -> bool {
        match self {
            Predicate::Any => true,
            _ => self.values().any(|v| cell.matches(v)),
        }
    }

    /// The non-blank values this predicate accepts.
    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Predicate::Any => Box::new(std::iter::empty()),
            Predicate::Eq(v) => Box::new(std::iter::once(v).filter(|v| !v.is_blank())),
            Predicate::In(set) => Box::new(set.iter().filter(|v| !v.is_blank())),
        }
    }
}

impl From<Value> for Predicate {
    fn from(v: Value) -> Self {
        Predicate::Eq(v)
    }
}

impl From<&str> for Predicate {
    fn from(s: &str) -> Self {
        Predicate::Eq(Value::from(s))
    }
}

impl FromIterator<Value> for Predicate {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Predicate::In(iter.into_iter().collect())
    }
}

/// Per-column selection state: maps column_name → predicate.
/// Columns absent from the map are unconstrained.
pub type Filters = BTreeMap<String, Predicate>;

/// Distinct values of each `column`, for building filter choices.
pub fn filter_options(table: &Table, columns: &[String]) -> BTreeMap<String, BTreeSet<Value>> {
    columns
        .iter()
        .filter(|c| table.has_column(c))
        .map(|col| {
            let values = table
                .column_values(col)
                .filter(|v| !v.is_blank())
                .cloned()
                .collect();
            (col.clone(), values)
        })
        .collect()
}

/// Return the rows that pass every active predicate, in their original order.
///
/// Predicates against columns the table lacks fail with `UnknownColumn`; a
/// predicate value that can never match the column's kind fails with
/// `TypeMismatch`.
pub fn filter_by_columns(table: &Table, filters: &Filters) -> Result<Table> {
    let mut active = Vec::new();
    for (col, pred) in filters {
        if pred.is_unconstrained() {
            continue;
        }
        let kind = table.kind(col)?;
        if let Some(bad) = pred.values().find(|v| !kind.accepts(v.kind())) {
            return Err(FrameError::TypeMismatch {
                column: col.clone(),
                expected: kind.to_string(),
                found: bad.kind(),
            });
        }
        active.push((col.as_str(), pred));
    }

    let out = table.retain_rows(|row| {
        active
            .iter()
            .all(|(col, pred)| row.get(*col).is_some_and(|cell| pred.accepts(cell)))
    });
    debug!(
        "column filter: {} active predicates, {} -> {} rows",
        active.len(),
        table.len(),
        out.len()
    );
    Ok(out)
}

/// Keep rows with `start <= date <= end`. Rows with no date are dropped.
pub fn filter_by_date(
    table: &Table,
    date_column: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Table> {
    let kind = table.kind(date_column)?;
    if !ColumnKind::Date.accepts(kind) {
        return Err(FrameError::TypeMismatch {
            column: date_column.to_string(),
            expected: ColumnKind::Date.to_string(),
            found: kind,
        });
    }
    let out = table.retain_rows(|row| {
        row.get(date_column)
            .and_then(Value::as_date)
            .is_some_and(|d| start <= d && d <= end)
    });
    debug!(
        "date filter {start}..={end}: {} -> {} rows",
        table.len(),
        out.len()
    );
    Ok(out)
}
