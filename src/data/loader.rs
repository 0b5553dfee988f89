use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type,
};
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::date;
use super::model::{ColumnKind, Row, Table, Value};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a flat table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – flat scalar columns (strings, ints, floats, bools, dates)
/// * `.json`    – `[{ "date": 20230101, "sales": 3.5, ... }, ...]`
/// * `.csv`     – header row, cell types guessed per value
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    info!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "date": 20230101, "region": "north", "sales": 12.5 },
///   ...
/// ]
/// ```
pub fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

/// Parse records-oriented JSON text into a table.
pub fn parse_json(text: &str) -> Result<Table> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let row: Row = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_value(val)))
            .collect();
        rows.push(row);
    }

    Table::from_records(rows).context("building table from JSON records")
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader / writer
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
/// Empty cells are null; each column is typed as a whole (see [`guess_column`]).
pub fn load_csv(path: &Path) -> Result<Table> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv(reader)
}

/// Read CSV records from any reader into a table.
pub fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Table> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        records.push(result.with_context(|| format!("CSV row {row_no}"))?);
    }

    let mut columns: Vec<_> = (0..headers.len())
        .map(|i| {
            let cells: Vec<&str> = records.iter().map(|r| r.get(i).unwrap_or("")).collect();
            guess_column(&cells).into_iter()
        })
        .collect();

    let rows: Vec<Row> = (0..records.len())
        .map(|_| {
            headers
                .iter()
                .zip(columns.iter_mut())
                .map(|(col, cells)| (col.clone(), cells.next().unwrap_or(Value::Null)))
                .collect()
        })
        .collect();

    Table::new(headers, rows).context("building table from CSV")
}

/// Type a whole CSV column. Cells keep their guessed kinds when those
/// unify (integers widen to floats); otherwise every non-empty cell is
/// kept as text, so `12` next to `A7` stays `"12"`.
pub fn guess_column(cells: &[&str]) -> Vec<Value> {
    let guessed: Vec<Value> = cells.iter().map(|c| guess_value(c)).collect();
    let uniform = guessed
        .iter()
        .try_fold(ColumnKind::Empty, |kind, v| kind.merge(v.kind()))
        .is_some();
    if uniform {
        return guessed;
    }
    cells
        .iter()
        .map(|c| {
            if c.is_empty() {
                Value::Null
            } else {
                Value::String(c.to_string())
            }
        })
        .collect()
}

/// Guess the type of a textual cell.
pub fn guess_value(s: &str) -> Value {
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if s == "true" || s == "false" {
        return Value::Bool(s == "true");
    }
    Value::String(s.to_string())
}

/// Write `table` as CSV. Dates are written in their 8-digit form so the
/// output loads back into a frame unchanged; nulls are empty cells.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.columns())
        .context("writing CSV header")?;
    for (row_no, row) in table.rows().iter().enumerate() {
        let cells = table.columns().iter().map(|col| match row.get(col) {
            Some(Value::Date(d)) => date::format_compact(*d),
            Some(v) => v.to_string(),
            None => String::new(),
        });
        out.write_record(cells)
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }
    out.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of flat scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Unsupported column types are rendered
/// as their type name so the column still shows up.
pub fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        for row in 0..batch.num_rows() {
            let record: Row = schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, col)| (field.name().clone(), extract_value(col, row)))
                .collect();
            rows.push(record);
        }
    }

    Table::new(columns, rows).context("building table from parquet")
}

/// Extract a single value from an Arrow column at a given row.
fn extract_value(col: &ArrayRef, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => Value::Integer(i64::from(col.as_primitive::<Int32Type>().value(row))),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => {
            Value::Float(f64::from(col.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        DataType::Date32 => col
            .as_primitive::<Date32Type>()
            .value_as_date(row)
            .map_or(Value::Null, Value::Date),
        other => Value::String(format!("{other:?}")),
    }
}
