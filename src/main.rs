use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::{info, warn};

use timeframe::color::SeriesPalette;
use timeframe::config::{load_config, FrameConfig};
use timeframe::data::date::parse_flexible;
use timeframe::data::filter::{Filters, Predicate};
use timeframe::data::loader::{guess_value, load_file, write_csv};
use timeframe::data::{TimeFrame, Value};
use timeframe::predict::Predictor;

const APP_ABOUT: &str = "Filter, aggregate, resample and forecast a dated table for charting";
const DEFAULT_LAST_N: usize = 30;

#[derive(Parser, Debug)]
#[command(name = "timeframe", version, about = APP_ABOUT)]
struct Args {
    /// Input table (.csv, .json or .parquet).
    input: PathBuf,

    /// TOML file with column roles (dateColumn, target, label, ...).
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Date column holding YYYYMMDD values.
    #[arg(long, value_name = "COLUMN")]
    date_column: Option<String>,

    /// Numeric column to sum and predict.
    #[arg(long, value_name = "COLUMN")]
    target: Option<String>,

    /// Series label for the loaded rows.
    #[arg(long)]
    label: Option<String>,

    /// Name of the series column.
    #[arg(long, value_name = "COLUMN")]
    series_column: Option<String>,

    /// Disable series tagging (forecasts become a no-op).
    #[arg(long)]
    no_graph: bool,

    /// Column never offered for filtering (repeatable).
    #[arg(long = "exclude", value_name = "COLUMN")]
    exclude: Vec<String>,

    /// Column predicate COLUMN=VALUE (repeatable; repeating a column accepts any of its values).
    #[arg(short = 'f', long = "filter", value_name = "COLUMN=VALUE")]
    filters: Vec<String>,

    /// First date to keep (YYYYMMDD or YYYY-MM-DD).
    #[arg(long, value_parser = parse_date_arg)]
    start: Option<NaiveDate>,

    /// Last date to keep (YYYYMMDD or YYYY-MM-DD).
    #[arg(long, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,

    /// Sum the target per date.
    #[arg(long)]
    aggregate: bool,

    /// Sum the target into day/week/month buckets sized by the date range.
    #[arg(long)]
    resample: bool,

    /// Append a forecast series under this label.
    #[arg(long, value_name = "LABEL")]
    forecast: Option<String>,

    /// Series to forecast from (defaults to the target name).
    #[arg(long, value_name = "SERIES", requires = "forecast")]
    from_series: Option<String>,

    /// Number of trailing rows fed to the predictor.
    #[arg(long, default_value_t = DEFAULT_LAST_N)]
    last_n: usize,

    /// Built-in predictor used for --forecast.
    #[arg(long, value_enum, default_value_t = Predictor::Linear)]
    predictor: Predictor,

    /// Insert a blank row at this position (chart break).
    #[arg(long, value_name = "POSITION")]
    gap_at: Option<usize>,

    /// Where to write the resulting CSV (stdout if omitted).
    #[arg(short = 'o', long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print the series colour legend to stderr.
    #[arg(long)]
    legend: bool,

    /// Print the filterable columns and their values, then exit.
    #[arg(long)]
    list_filters: bool,
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_flexible(raw).ok_or_else(|| format!("'{raw}' is not a YYYYMMDD or YYYY-MM-DD date"))
}

/// Merge the optional config file with command-line overrides.
fn resolve_config(args: &Args) -> Result<FrameConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let (Some(date_column), Some(target)) = (&args.date_column, &args.target) else {
                bail!("--date-column and --target are required without --config");
            };
            FrameConfig::new(date_column.clone(), target.clone())
        }
    };
    if let Some(date_column) = &args.date_column {
        config.date_column = date_column.clone();
    }
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    if let Some(label) = &args.label {
        config.label = label.clone();
    }
    if let Some(series_column) = &args.series_column {
        config.series_column = series_column.clone();
    }
    if args.no_graph {
        config.with_graph = false;
    }
    config
        .exclude_columns_from_filter
        .extend(args.exclude.iter().cloned());
    Ok(config)
}

/// Turn `COLUMN=VALUE` pairs into predicates; repeated columns become sets.
/// Values for `date_column` are parsed as dates.
fn parse_filters(raw: &[String], date_column: &str) -> Result<Filters> {
    let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for item in raw {
        let Some((col, val)) = item.split_once('=') else {
            bail!("filter '{item}' is not COLUMN=VALUE");
        };
        let (col, val) = (col.trim(), val.trim());
        let value = if col == date_column && !val.is_empty() {
            Value::Date(parse_date_arg(val).map_err(anyhow::Error::msg)?)
        } else {
            guess_value(val)
        };
        grouped.entry(col.to_string()).or_default().push(value);
    }
    Ok(grouped
        .into_iter()
        .map(|(col, mut values)| {
            let pred = if values.len() == 1 {
                Predicate::Eq(values.remove(0))
            } else {
                values.into_iter().collect()
            };
            (col, pred)
        })
        .collect())
}

fn run(args: &Args) -> Result<()> {
    let config = resolve_config(args)?;
    let table = load_file(&args.input)?;
    let mut frame = TimeFrame::new(&table, config)
        .with_context(|| format!("preparing {}", args.input.display()))?;

    if args.list_filters {
        for (col, values) in frame.filter_options() {
            let shown: Vec<String> = values.iter().map(Value::to_string).collect();
            println!("{col}: {}", shown.join(", "));
        }
        return Ok(());
    }

    let filters = parse_filters(&args.filters, &frame.config().date_column)?;
    if !filters.is_empty() {
        frame.apply(|f| f.filter_by_columns(&filters))?;
    }

    let start = args.start.or(frame.min_date());
    let end = args.end.or(frame.max_date());
    if args.start.is_some() || args.end.is_some() {
        if let (Some(start), Some(end)) = (start, end) {
            frame.apply(|f| f.filter_by_date(start, end))?;
        }
    }

    if args.aggregate {
        frame.apply(TimeFrame::aggregate)?;
    }
    if args.resample {
        match (start, end) {
            (Some(start), Some(end)) => {
                frame.apply(|f| f.aggregate_by_timespan(start, end))?;
            }
            _ => warn!("no dates to size buckets from, skipping resample"),
        }
    }

    if let Some(label) = &args.forecast {
        let target = frame.target().to_string();
        let predictor = args.predictor;
        let predict = |window: &timeframe::Table| predictor.predict(window, &target);
        match &args.from_series {
            Some(source) => {
                frame.apply(|f| f.add_prediction_from(source, label, args.last_n, predict))?
            }
            None => frame.apply(|f| f.add_prediction(label, args.last_n, predict))?,
        };
    }

    if let Some(position) = args.gap_at {
        frame.insert_empty_row_at(position)?;
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_csv(frame.table(), BufWriter::new(file))?;
            info!("wrote {} rows to {}", frame.table().len(), path.display());
        }
        None => write_csv(frame.table(), io::stdout().lock())?,
    }

    if args.legend && frame.config().with_graph {
        let palette = SeriesPalette::new(frame.table(), &frame.config().series_column);
        for (label, hex) in palette.legend_entries() {
            eprintln!("{hex}  {label}");
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(&args)
}
