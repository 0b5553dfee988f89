use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

use timeframe::data::date::format_compact;

const DAYS: i64 = 730;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Daily sales level: linear growth, a weekly cycle peaking on Saturday and
/// a yearly cycle peaking in December.
fn expected_sales(day: NaiveDate, offset: i64, base: f64) -> f64 {
    let weekly = 1.0 + 0.25 * (day.weekday().num_days_from_monday() as f64 / 6.0);
    let yearly = 1.0
        + 0.3 * ((day.ordinal() as f64 / 365.0) * 2.0 * std::f64::consts::PI - 5.5).cos();
    base * (1.0 + offset as f64 / DAYS as f64) * weekly * yearly
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("start date")?;
    let regions = [("north", 120.0), ("south", 80.0), ("west", 45.0)];
    let products = [("widget", 1.0), ("gadget", 0.6)];

    // Collect all rows
    let mut all_date: Vec<i64> = Vec::new();
    let mut all_region: Vec<&str> = Vec::new();
    let mut all_product: Vec<&str> = Vec::new();
    let mut all_sales: Vec<f64> = Vec::new();
    let mut all_units: Vec<i64> = Vec::new();

    for offset in 0..DAYS {
        let day = start + Duration::days(offset);
        let compact: i64 = format_compact(day).parse().context("compact date")?;
        for &(region, base) in &regions {
            for &(product, share) in &products {
                let level = expected_sales(day, offset, base * share);
                let sales = (level + rng.gauss(0.0, level * 0.1)).max(0.0);
                all_date.push(compact);
                all_region.push(region);
                all_product.push(product);
                all_sales.push((sales * 100.0).round() / 100.0);
                all_units.push((sales / 9.99).round() as i64);
            }
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("date", DataType::Int64, false),
        Field::new("region", DataType::Utf8, false),
        Field::new("product", DataType::Utf8, false),
        Field::new("sales", DataType::Float64, false),
        Field::new("units", DataType::Int64, false),
    ]));

    let rows = all_date.len();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(all_date)),
            Arc::new(StringArray::from(all_region)),
            Arc::new(StringArray::from(all_product)),
            Arc::new(Float64Array::from(all_sales)),
            Arc::new(Int64Array::from(all_units)),
        ],
    )
    .context("creating record batch")?;

    // Write Parquet
    let output_path = "sample_sales.parquet";
    let file = std::fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    println!("Wrote {rows} rows ({DAYS} days) to {output_path}");
    Ok(())
}
