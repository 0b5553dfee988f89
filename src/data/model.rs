use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use super::error::{FrameError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Using `BTreeMap` / `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Calendar date produced by date-column normalization.
    Date(NaiveDate),
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl Value {
    /// Try to interpret the value as an `f64` for summing and prediction.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::String(_) => ColumnKind::Text,
            Value::Integer(_) => ColumnKind::Integer,
            Value::Float(_) => ColumnKind::Float,
            Value::Bool(_) => ColumnKind::Bool,
            Value::Date(_) => ColumnKind::Date,
            Value::Null => ColumnKind::Empty,
        }
    }

    /// `Null` and the empty string carry no information for filtering.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Equality used by predicates: integers and floats compare numerically,
    /// `Null` never matches anything.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – inferred type of a column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnKind {
    /// Every cell is `Null`; compatible with anything.
    Empty,
    Bool,
    Integer,
    Float,
    Text,
    Date,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Empty => "empty",
            ColumnKind::Bool => "bool",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::Date => "date",
        };
        f.write_str(name)
    }
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    /// Unify two kinds observed in the same column.
    pub fn merge(self, other: ColumnKind) -> Option<ColumnKind> {
        use ColumnKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => Some(k),
            (a, b) if a == b => Some(a),
            (Integer, Float) | (Float, Integer) => Some(Float),
            _ => None,
        }
    }

    /// Whether a value of kind `value` can ever match a cell of this column.
    pub fn accepts(self, value: ColumnKind) -> bool {
        self.merge(value).is_some()
    }
}

// ---------------------------------------------------------------------------
// Table – ordered rows with a column schema
// ---------------------------------------------------------------------------

/// One record: column name → value. Every row of a [`Table`] holds every column.
pub type Row = BTreeMap<String, Value>;

/// Column name → inferred kind.
pub type Schema = BTreeMap<String, ColumnKind>;

/// An ordered, schema-checked table. Row positions double as the row index
/// and are always contiguous `0..len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    schema: Schema,
}

impl Table {
    /// Build a table from explicit column order and rows.
    ///
    /// Missing cells become `Null`; cells naming a column outside `columns`
    /// are rejected, as are columns mixing incompatible kinds.
    pub fn new(columns: Vec<String>, mut rows: Vec<Row>) -> Result<Self> {
        for row in &mut rows {
            if let Some(extra) = row.keys().find(|k| !columns.contains(*k)) {
                return Err(FrameError::UnknownColumn(extra.clone()));
            }
            for col in &columns {
                row.entry(col.clone()).or_insert(Value::Null);
            }
        }
        let schema = infer_schema(&columns, &rows)?;
        Ok(Table {
            columns,
            rows,
            schema,
        })
    }

    /// Build a table from records, taking columns in first-seen order.
    pub fn from_records(records: Vec<Row>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for rec in &records {
            for key in rec.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Table::new(columns, records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.schema.contains_key(column)
    }

    /// Kind of `column`, or `UnknownColumn`.
    pub fn kind(&self, column: &str) -> Result<ColumnKind> {
        self.schema
            .get(column)
            .copied()
            .ok_or_else(|| FrameError::UnknownColumn(column.to_string()))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (`row`, `column`); `None` if either is out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row)?.get(column)
    }

    /// All values of one column in row order.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().filter_map(move |r| r.get(column))
    }

    /// Keep rows for which `keep` is true, in their original order.
    /// The schema is carried over unchanged.
    pub fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Row) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
            schema: self.schema.clone(),
        }
    }

    /// The last `n` rows satisfying `keep`, in their original order.
    pub fn tail_where<F>(&self, n: usize, mut keep: F) -> Table
    where
        F: FnMut(&Row) -> bool,
    {
        let mut picked: Vec<Row> = self
            .rows
            .iter()
            .rev()
            .filter(|r| keep(r))
            .take(n)
            .cloned()
            .collect();
        picked.reverse();
        Table {
            columns: self.columns.clone(),
            rows: picked,
            schema: self.schema.clone(),
        }
    }

    /// A copy with one all-`Null` row inserted at `position`.
    ///
    /// `position` may equal `len()` (append). Rows at and after `position`
    /// shift down by one; the column set is unchanged.
    pub fn with_empty_row_at(&self, position: usize) -> Result<Table> {
        if position > self.rows.len() {
            return Err(FrameError::Index {
                position,
                len: self.rows.len(),
            });
        }
        let blank: Row = self
            .columns
            .iter()
            .map(|c| (c.clone(), Value::Null))
            .collect();
        let mut rows = self.rows.clone();
        rows.insert(position, blank);
        Ok(Table {
            columns: self.columns.clone(),
            rows,
            schema: self.schema.clone(),
        })
    }

    /// A copy with `extra` rows appended after the existing ones.
    pub fn appended(&self, extra: Vec<Row>) -> Result<Table> {
        let mut rows = self.rows.clone();
        rows.extend(extra);
        Table::new(self.columns.clone(), rows)
    }

    /// A copy where `f` rewrites every row. Columns named in `add_columns`
    /// that are not present yet are appended to the column order.
    pub fn map_rows<F>(&self, add_columns: &[&str], mut f: F) -> Result<Table>
    where
        F: FnMut(&mut Row) -> Result<()>,
    {
        let mut columns = self.columns.clone();
        for col in add_columns {
            if !columns.iter().any(|c| c == col) {
                columns.push((*col).to_string());
            }
        }
        let mut rows = self.rows.clone();
        for row in &mut rows {
            f(row)?;
        }
        Table::new(columns, rows)
    }
}

fn infer_schema(columns: &[String], rows: &[Row]) -> Result<Schema> {
    let mut schema = Schema::new();
    for col in columns {
        let mut kind = ColumnKind::Empty;
        for row in rows {
            let seen = row.get(col).map_or(ColumnKind::Empty, Value::kind);
            kind = kind.merge(seen).ok_or_else(|| FrameError::MixedColumn {
                column: col.clone(),
                first: kind,
                second: seen,
            })?;
        }
        schema.insert(col.clone(), kind);
    }
    Ok(schema)
}

/// Build a [`Row`] from `(column, value)` pairs.
pub fn row<I, K, V>(cells: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
