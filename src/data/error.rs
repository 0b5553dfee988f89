use thiserror::Error;

use super::model::ColumnKind;

/// Errors raised by the table engine.
///
/// File and configuration loading sit outside the engine and report through
/// `anyhow` instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// A date cell is not an 8-digit `YYYYMMDD` calendar value.
    #[error("column '{column}': '{value}' is not a YYYYMMDD date")]
    Format { column: String, value: String },

    /// Blank-row insertion outside `0..=len`.
    #[error("insert position {position} out of range for {len} rows")]
    Index { position: usize, len: usize },

    /// The prediction function returned the wrong number of values.
    #[error("predictor returned {actual} values for a window of {expected} rows")]
    Contract { expected: usize, actual: usize },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// `found` is the offending kind: the column's for role checks, the
    /// predicate value's for filters.
    #[error("column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: ColumnKind,
    },

    /// A column mixes value kinds that cannot be unified.
    #[error("column '{column}' mixes {first} and {second} values")]
    MixedColumn {
        column: String,
        first: ColumnKind,
        second: ColumnKind,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = FrameError> = std::result::Result<T, E>;
